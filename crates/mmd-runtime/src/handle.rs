use mmd_backend::CatalogSource;
use mmd_schemas::{GameMode, PoolView, StatusView, TicketView};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::DashboardError;

/// Full point-in-time view of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub modes: Vec<GameMode>,
    /// `None` until the first catalog load finished.
    pub catalog_source: Option<CatalogSource>,
    pub selected_mode: Option<String>,
    pub slots: u32,
    /// Slots with an enqueue request still awaiting the backend.
    pub in_flight_slots: Vec<u32>,
    pub pool: PoolView,
    pub status: StatusView,
    pub history_entries: usize,
    pub history_head: Option<String>,
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Snapshot(Reply<DashboardSnapshot>),
    SelectMode {
        mode: String,
        reply: Reply<Result<(), DashboardError>>,
    },
    ReloadCatalog(Reply<CatalogSource>),
    Submit {
        slot: u32,
        reply: Reply<Result<TicketView, DashboardError>>,
    },
    Ticket {
        slot: u32,
        reply: Reply<Result<TicketView, DashboardError>>,
    },
    Clear(Reply<usize>),
    RunMatch(Reply<()>),
    Reset(Reply<()>),
    ExportHistory(Reply<Result<String, DashboardError>>),
}

/// Cloneable handle to a running dashboard. The runtime stops once every
/// handle has been dropped.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<Command>,
}

impl DashboardHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DashboardError::stopped())?;
        rx.await.map_err(|_| DashboardError::stopped())
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot, DashboardError> {
        self.request(Command::Snapshot).await
    }

    pub async fn select_mode(&self, mode: impl Into<String>) -> Result<(), DashboardError> {
        let mode = mode.into();
        self.request(|reply| Command::SelectMode { mode, reply })
            .await?
    }

    /// Explicit catalog reload. Resolves once the new catalog is active.
    pub async fn reload_catalog(&self) -> Result<CatalogSource, DashboardError> {
        self.request(Command::ReloadCatalog).await
    }

    /// Queue a simulated player in `slot` for the selected mode.
    pub async fn submit(&self, slot: u32) -> Result<TicketView, DashboardError> {
        self.request(|reply| Command::Submit { slot, reply }).await?
    }

    pub async fn ticket(&self, slot: u32) -> Result<TicketView, DashboardError> {
        self.request(|reply| Command::Ticket { slot, reply }).await?
    }

    /// Local-only clear; returns how many tickets were dropped.
    pub async fn clear(&self) -> Result<usize, DashboardError> {
        self.request(Command::Clear).await
    }

    pub async fn run_match(&self) -> Result<(), DashboardError> {
        self.request(Command::RunMatch).await
    }

    pub async fn reset(&self) -> Result<(), DashboardError> {
        self.request(Command::Reset).await
    }

    /// Audit history as JSON Lines.
    pub async fn export_history(&self) -> Result<String, DashboardError> {
        self.request(Command::ExportHistory).await?
    }
}

//! Shared state for mmd-daemon.
//!
//! Dashboard state itself lives in the runtime task; handlers only hold a
//! [`DashboardHandle`] and the SSE bus.

use std::sync::Arc;
use std::time::Duration;

use mmd_config::DashboardConfig;
use mmd_backend::BackendApi;
use mmd_push::PushSignal;
use mmd_runtime::{spawn_dashboard, DashboardHandle, PlayerGenerator, RuntimeDeps};
use mmd_schemas::{Notification, RenderSink};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Dashboard { notification: Notification },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Dashboard { notification } => match notification {
                Notification::PoolChanged(_) => "pool",
                Notification::MatchFound { .. } => "match",
                Notification::MatchDetail { .. } => "match_detail",
                Notification::StatusChanged(_) => "status",
                Notification::CatalogChanged { .. } => "catalog",
                Notification::Log(_) => "log",
            },
        }
    }
}

/// Render sink that republishes every notification on the bus.
#[derive(Clone, Debug)]
pub struct BusSink {
    bus: broadcast::Sender<BusMsg>,
}

impl BusSink {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

impl RenderSink for BusSink {
    fn notify(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.bus.send(BusMsg::Dashboard { notification });
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub dashboard: DashboardHandle,
    /// Hash of the effective configuration, if it came from the loader.
    pub config_hash: Option<String>,
}

impl AppState {
    /// Start a dashboard runtime whose notifications go to a fresh bus.
    pub fn start(
        config: &DashboardConfig,
        backend: Arc<dyn BackendApi>,
        generator: Box<dyn PlayerGenerator>,
        push: Option<mpsc::Receiver<PushSignal>>,
        config_hash: Option<String>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let deps = RuntimeDeps {
            backend,
            sink: Arc::new(BusSink::new(bus.clone())),
            generator,
            push,
        };
        let (dashboard, task) = spawn_dashboard(config, deps);
        let st = Self {
            bus,
            build: BuildInfo {
                service: "mmd-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            dashboard,
            config_hash,
        };
        (Arc::new(st), task)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

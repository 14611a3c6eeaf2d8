use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mmd_backend::{
    load_catalog, BackendApi, BackendError, CatalogLoad, CatalogSource, GameModeCatalog,
};
use mmd_config::DashboardConfig;
use mmd_push::{PushChannelManager, PushSignal};
use mmd_reconcile::{PollWatermark, ReconcileEngine};
use mmd_registry::{PlayerTicket, TicketRegistry};
use mmd_schemas::{
    ConnectionState, GameMode, JoinQueueRequest, JoinQueueResponse, MatchEvent, Notification,
    PoolSnapshot, PushEvent, PushEventKind, RenderSink, SystemStatus, TicketView,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::handle::{Command, DashboardHandle, DashboardSnapshot, Reply};
use crate::{DashboardError, PlayerGenerator, PlayerProfile};

const COMMAND_CAPACITY: usize = 64;
const RESULT_CAPACITY: usize = 256;

/// Collaborators injected into the runtime.
pub struct RuntimeDeps {
    pub backend: Arc<dyn BackendApi>,
    pub sink: Arc<dyn RenderSink>,
    pub generator: Box<dyn PlayerGenerator>,
    /// Receiving end of the push transport, if one is running.
    pub push: Option<mpsc::Receiver<PushSignal>>,
}

/// Start the dashboard runtime on the current tokio runtime.
///
/// On start the catalog is loaded once (timeout + fallback) and the status
/// and pool pollers begin ticking. The task ends when every
/// [`DashboardHandle`] has been dropped.
pub fn spawn_dashboard(
    config: &DashboardConfig,
    deps: RuntimeDeps,
) -> (DashboardHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (results_tx, results_rx) = mpsc::channel(RESULT_CAPACITY);

    let sim = &config.simulation;
    let registry = TicketRegistry::new(sim.slots, sim.skill_min..=sim.skill_max);

    let runtime = Runtime {
        core: Core {
            engine: ReconcileEngine::new(registry),
            sink: deps.sink,
            catalog: None,
            selected_mode: None,
            in_flight: BTreeSet::new(),
            initialized: false,
        },
        push: push_manager(),
        backend: deps.backend,
        generator: deps.generator,
        commands: cmd_rx,
        results_tx,
        results_rx,
        push_rx: deps.push,
        catalog_timeout: config.timing.catalog_timeout(),
        request_timeout: config.timing.request_timeout(),
        catalog_seq: 0,
        catalog_watermark: PollWatermark::new(),
        fallback_modes: config.effective_fallback_modes(),
        status_every: config.timing.status_poll_interval(),
        pool_every: config.timing.pool_poll_interval(),
        pollers: Vec::new(),
    };

    let task = tokio::spawn(runtime.run());
    (DashboardHandle::new(cmd_tx), task)
}

/// Handlers are registered here, once, for the lifetime of the runtime.
fn push_manager() -> PushChannelManager<Core> {
    let mut m = PushChannelManager::new();
    m.register(PushEventKind::MatchFound, |core: &mut Core, ev| {
        if let PushEvent::MatchFound(event) = ev {
            core.on_match(&event);
        }
    });
    m.register(PushEventKind::DashboardLog, |core: &mut Core, ev| {
        if let PushEvent::DashboardLog(log) = ev {
            core.info(format!("BACKEND: {}", log.message));
        }
    });
    m.register(PushEventKind::PoolUpdated, |core: &mut Core, ev| {
        if let PushEvent::PoolUpdated(update) = ev {
            let action = update.action.as_deref().unwrap_or("-");
            core.info(format!("POOL UPDATE: {} | {}", update.game_mode, action));
        }
    });
    m
}

// ---------------------------------------------------------------------------
// Core: state mutated by handlers
// ---------------------------------------------------------------------------

struct Core {
    engine: ReconcileEngine,
    sink: Arc<dyn RenderSink>,
    catalog: Option<GameModeCatalog>,
    selected_mode: Option<String>,
    in_flight: BTreeSet<u32>,
    initialized: bool,
}

impl Core {
    fn emit(&self, notifications: Vec<Notification>) {
        for n in notifications {
            self.sink.notify(n);
        }
    }

    fn info(&mut self, message: impl Into<String>) {
        let n = self.engine.log_info(message);
        self.sink.notify(n);
    }

    fn error(&mut self, message: impl Into<String>) {
        let n = self.engine.log_error(message);
        self.sink.notify(n);
    }

    fn on_match(&mut self, event: &MatchEvent) {
        let (_, notifications) = self.engine.on_match_event(event);
        self.emit(notifications);
    }

    fn catalog_changed(&self) -> Notification {
        let (modes, fallback) = match &self.catalog {
            Some(c) => (c.modes().to_vec(), c.is_fallback()),
            None => (Vec::new(), false),
        };
        Notification::CatalogChanged {
            modes,
            selected: self.selected_mode.clone(),
            fallback,
        }
    }

    fn snapshot(&self) -> DashboardSnapshot {
        let audit = self.engine.audit();
        DashboardSnapshot {
            modes: self
                .catalog
                .as_ref()
                .map(|c| c.modes().to_vec())
                .unwrap_or_default(),
            catalog_source: self.catalog.as_ref().map(GameModeCatalog::source),
            selected_mode: self.selected_mode.clone(),
            slots: self.engine.registry().slots(),
            in_flight_slots: self.in_flight.iter().copied().collect(),
            pool: self.engine.pool_view(),
            status: self.engine.status_view(),
            history_entries: audit.len(),
            history_head: audit.last_hash().map(str::to_string),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime loop
// ---------------------------------------------------------------------------

/// Results of work done off the runtime task.
enum TaskResult {
    CatalogLoaded {
        seq: u64,
        load: CatalogLoad,
        reply: Option<Reply<CatalogSource>>,
    },
    Enqueued {
        slot: u32,
        mode: String,
        profile: PlayerProfile,
        result: Result<JoinQueueResponse, BackendError>,
        reply: Reply<Result<TicketView, DashboardError>>,
    },
    PoolPolled {
        seq: u64,
        result: Result<PoolSnapshot, BackendError>,
    },
    StatusPolled {
        seq: u64,
        result: Result<SystemStatus, BackendError>,
    },
}

struct Runtime {
    core: Core,
    push: PushChannelManager<Core>,
    backend: Arc<dyn BackendApi>,
    generator: Box<dyn PlayerGenerator>,
    commands: mpsc::Receiver<Command>,
    results_tx: mpsc::Sender<TaskResult>,
    results_rx: mpsc::Receiver<TaskResult>,
    push_rx: Option<mpsc::Receiver<PushSignal>>,
    catalog_timeout: Duration,
    request_timeout: Duration,
    /// Last catalog load issued; loads overlap when reloads are requested
    /// back to back.
    catalog_seq: u64,
    catalog_watermark: PollWatermark,
    fallback_modes: Vec<GameMode>,
    status_every: Duration,
    pool_every: Duration,
    pollers: Vec<JoinHandle<()>>,
}

impl Runtime {
    async fn run(mut self) {
        info!("dashboard runtime started");

        if self.push_rx.is_some() && self.push.start() {
            let n = self.core.engine.set_connection(ConnectionState::Connecting);
            self.core.emit(n);
        }
        self.spawn_catalog_load(None);
        self.spawn_pollers();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },
                Some(result) = self.results_rx.recv() => self.on_result(result),
                signal = next_signal(&mut self.push_rx) => self.on_push_signal(signal),
            }
        }

        for p in self.pollers.drain(..) {
            p.abort();
        }
        info!("dashboard runtime stopped");
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    fn on_push_signal(&mut self, signal: Option<PushSignal>) {
        match signal {
            Some(PushSignal::Connected) => {
                let log = self.push.on_connect();
                self.record_connection(log);
            }
            Some(PushSignal::Disconnected { reason }) => {
                debug!(%reason, "push transport reported disconnect");
                let log = self.push.on_disconnect();
                self.record_connection(log);
            }
            Some(PushSignal::Frame(text)) => {
                let outcome = self.push.dispatch(&mut self.core, &text);
                if let Some(n) = outcome.log_line() {
                    let n = self.core.engine.record(vec![n]);
                    self.core.emit(n);
                }
            }
            None => {
                warn!("push transport ended");
                self.push_rx = None;
                let log = self.push.on_disconnect();
                self.record_connection(log);
            }
        }
    }

    fn record_connection(&mut self, log: Option<Notification>) {
        if let Some(n) = log {
            let n = self.core.engine.record(vec![n]);
            self.core.emit(n);
        }
        let n = self.core.engine.set_connection(self.push.state());
        self.core.emit(n);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.core.snapshot());
            }
            Command::SelectMode { mode, reply } => {
                let _ = reply.send(self.select_mode(mode));
            }
            Command::ReloadCatalog(reply) => self.spawn_catalog_load(Some(reply)),
            Command::Submit { slot, reply } => self.begin_submit(slot, reply),
            Command::Ticket { slot, reply } => {
                let res = self
                    .core
                    .engine
                    .registry()
                    .get_by_slot(slot)
                    .map(PlayerTicket::view)
                    .map_err(DashboardError::from);
                let _ = reply.send(res);
            }
            Command::Clear(reply) => {
                let (removed, n) = self.core.engine.clear();
                self.core.emit(n);
                let _ = reply.send(removed);
            }
            Command::RunMatch(reply) => {
                for line in [
                    "[ℹ] BACKEND MATCHING: Matches are handled by the backend worker",
                    "> Backend worker automatically processes matches every 2 seconds",
                    "> Players will be matched when conditions are met",
                    "> Real-time match events are received via WebSocket",
                ] {
                    self.core.info(line);
                }
                let _ = reply.send(());
            }
            Command::Reset(reply) => {
                let n = self.core.engine.reset();
                self.core.emit(n);
                let _ = reply.send(());
            }
            Command::ExportHistory(reply) => {
                let res = self
                    .core
                    .engine
                    .audit()
                    .to_jsonl()
                    .map_err(|e| DashboardError::State(e.to_string()));
                let _ = reply.send(res);
            }
        }
    }

    fn select_mode(&mut self, mode: String) -> Result<(), DashboardError> {
        let known = self
            .core
            .catalog
            .as_ref()
            .map_or(false, |c| c.contains(&mode));
        if !known {
            return Err(DashboardError::Validation(format!(
                "unknown game mode: {mode}"
            )));
        }
        self.core.info(format!("MODE CHANGED: {}", mode.to_uppercase()));
        self.core.selected_mode = Some(mode);
        let n = self.core.catalog_changed();
        self.core.sink.notify(n);
        Ok(())
    }

    /// Validate, log, and hand the enqueue call to a background task. The
    /// registry is only touched when the result comes back.
    fn begin_submit(&mut self, slot: u32, reply: Reply<Result<TicketView, DashboardError>>) {
        let Some(mode) = self.core.selected_mode.clone() else {
            self.core.error("[X] ERROR: No game mode selected");
            let _ = reply.send(Err(DashboardError::Validation(
                "no game mode selected".to_string(),
            )));
            return;
        };
        if let Err(err) = self.core.engine.check_slot(slot) {
            debug!(slot, error = %err, "submission rejected");
            let _ = reply.send(Err(err.into()));
            return;
        }
        if self.core.in_flight.contains(&slot) {
            let _ = reply.send(Err(DashboardError::Validation(format!(
                "slot {slot} already has a submission in flight"
            ))));
            return;
        }

        let profile = self.generator.next_profile();
        self.core.info(format!(
            "> QUEUEING PLAYER_{slot} FOR {}...",
            mode.to_uppercase()
        ));
        self.core.in_flight.insert(slot);

        let req = JoinQueueRequest::single_region(
            profile.player_name.clone(),
            profile.skill,
            profile.region,
        );
        let backend = self.backend.clone();
        let timeout = self.request_timeout;
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = bounded(timeout, backend.join_queue(&mode, &req)).await;
            let _ = tx
                .send(TaskResult::Enqueued {
                    slot,
                    mode,
                    profile,
                    result,
                    reply,
                })
                .await;
        });
    }

    // -----------------------------------------------------------------------
    // Background results
    // -----------------------------------------------------------------------

    fn on_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::CatalogLoaded { seq, load, reply } => {
                self.apply_catalog(seq, load, reply)
            }
            TaskResult::Enqueued {
                slot,
                mode,
                profile,
                result,
                reply,
            } => {
                self.core.in_flight.remove(&slot);
                let _ = reply.send(self.finish_submit(slot, mode, profile, result));
            }
            TaskResult::PoolPolled { seq, result } => match result {
                Ok(snapshot) => {
                    let (_, n) = self.core.engine.on_pool_snapshot(seq, &snapshot);
                    self.core.emit(n);
                }
                Err(err) => warn!(seq, error = %err, "pool poll failed; keeping last aggregate"),
            },
            TaskResult::StatusPolled { seq, result } => match result {
                Ok(status) => {
                    let (_, n) = self.core.engine.on_system_status(seq, &status);
                    self.core.emit(n);
                }
                Err(err) => warn!(seq, error = %err, "status poll failed; keeping last status"),
            },
        }
    }

    fn finish_submit(
        &mut self,
        slot: u32,
        mode: String,
        profile: PlayerProfile,
        result: Result<JoinQueueResponse, BackendError>,
    ) -> Result<TicketView, DashboardError> {
        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                self.core.error(format!(
                    "[X] ERROR: Failed to queue player - {}",
                    err.reason()
                ));
                return Err(err.into());
            }
        };

        let ticket = PlayerTicket::new(
            slot,
            profile.player_name,
            profile.skill,
            profile.region,
            mode,
            resp.ticket_id().map(str::to_string),
            Utc::now(),
        );
        let view = ticket.view();
        match self.core.engine.insert_submitted(ticket) {
            Ok(n) => {
                info!(slot, ticket_id = ?view.ticket_id, "player queued");
                self.core.emit(n);
                Ok(view)
            }
            Err(err) => {
                self.core
                    .error(format!("[X] ERROR: Failed to queue player - {err}"));
                Err(err.into())
            }
        }
    }

    fn apply_catalog(
        &mut self,
        seq: u64,
        load: CatalogLoad,
        reply: Option<Reply<CatalogSource>>,
    ) {
        if !self.catalog_watermark.accept(seq).is_fresh() {
            debug!(seq, "discarding catalog load superseded by a newer one");
            if let Some(reply) = reply {
                let current = self
                    .core
                    .catalog
                    .as_ref()
                    .map_or(load.catalog.source(), GameModeCatalog::source);
                let _ = reply.send(current);
            }
            return;
        }

        let n = self.core.engine.record(load.notifications);
        self.core.emit(n);

        let catalog = load.catalog;
        let keep = self
            .core
            .selected_mode
            .as_deref()
            .map_or(false, |m| catalog.contains(m));
        if !keep {
            self.core.selected_mode = catalog.default_mode().map(|m| m.key.clone());
        }
        let source = catalog.source();
        self.core.catalog = Some(catalog);
        let n = self.core.catalog_changed();
        self.core.sink.notify(n);

        if !self.core.initialized {
            self.core.initialized = true;
            self.core.info("> SYSTEM INITIALIZATION COMPLETE");
            self.core.info("> READY FOR PLAYER CONNECTIONS");
        }

        if let Some(reply) = reply {
            let _ = reply.send(source);
        }
    }

    // -----------------------------------------------------------------------
    // Spawned work
    // -----------------------------------------------------------------------

    fn spawn_catalog_load(&mut self, reply: Option<oneshot::Sender<CatalogSource>>) {
        self.catalog_seq += 1;
        let seq = self.catalog_seq;
        let backend = self.backend.clone();
        let timeout = self.catalog_timeout;
        let fallback = self.fallback_modes.clone();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let load = load_catalog(&*backend, timeout, fallback).await;
            let _ = tx
                .send(TaskResult::CatalogLoaded { seq, load, reply })
                .await;
        });
    }

    fn spawn_pollers(&mut self) {
        let timeout = self.request_timeout;
        let backend = self.backend.clone();
        self.pollers.push(spawn_poller(
            self.status_every,
            self.results_tx.clone(),
            move |seq| {
                let backend = backend.clone();
                async move {
                    TaskResult::StatusPolled {
                        seq,
                        result: bounded(timeout, backend.system_status()).await,
                    }
                }
            },
        ));

        let backend = self.backend.clone();
        self.pollers.push(spawn_poller(
            self.pool_every,
            self.results_tx.clone(),
            move |seq| {
                let backend = backend.clone();
                async move {
                    TaskResult::PoolPolled {
                        seq,
                        result: bounded(timeout, backend.pool_status()).await,
                    }
                }
            },
        ));
    }
}

/// Bound a backend call so a silent backend cannot pin a slot in flight or
/// pile up poll tasks.
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(BackendError::Timeout(timeout)))
}

async fn next_signal(rx: &mut Option<mpsc::Receiver<PushSignal>>) -> Option<PushSignal> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Fire `poll` every `every`, first one interval after start.
///
/// Each request runs in its own task stamped with an increasing sequence
/// number, so a slow response never delays the next tick; the engine's
/// watermark discards responses that arrive out of order.
fn spawn_poller<F, Fut>(every: Duration, tx: mpsc::Sender<TaskResult>, poll: F) -> JoinHandle<()>
where
    F: Fn(u64) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut seq = 0u64;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                return;
            }
            seq += 1;
            let request = poll(seq);
            let tx = tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(request.await).await;
            });
        }
    })
}

//! mmd-testkit
//!
//! Test doubles for the dashboard runtime: a scripted [`FakeBackend`], a
//! [`RecordingSink`] that keeps every notification, a [`ScriptedPush`]
//! transport, and a [`Harness`] wiring them to a real runtime task.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use mmd_config::DashboardConfig;
use mmd_runtime::{
    spawn_dashboard, DashboardHandle, DashboardSnapshot, PlayerGenerator, PlayerProfile,
    RuntimeDeps,
};
use mmd_schemas::{GameMode, MatchEvent, Notification, PlayerSummary, Region};
use tokio::task::JoinHandle;

mod backend;
mod push;
mod sink;

pub use backend::{ticket_response, CatalogScript, FakeBackend};
pub use push::ScriptedPush;
pub use sink::RecordingSink;

/// Catalog served by a default [`FakeBackend`].
pub fn standard_modes() -> Vec<GameMode> {
    vec![
        GameMode::new("2v2_clash", "Two on two."),
        GameMode::new("1v1_duel", "A classic 1v1 fight to the finish."),
    ]
}

/// Default config with pollers slowed to one hour so they only fire when a
/// test advances the clock on purpose.
pub fn test_config() -> DashboardConfig {
    let mut cfg = DashboardConfig::default();
    cfg.timing.status_poll_ms = 3_600_000;
    cfg.timing.pool_poll_ms = 3_600_000;
    cfg
}

pub fn profile(name: &str, skill: i64, region: Region) -> PlayerProfile {
    PlayerProfile {
        player_name: name.to_string(),
        skill,
        region,
    }
}

/// Hands out the given profiles in order, then starts over.
#[derive(Debug, Clone)]
pub struct FixedGenerator {
    profiles: VecDeque<PlayerProfile>,
}

impl FixedGenerator {
    pub fn new(profiles: Vec<PlayerProfile>) -> Self {
        Self {
            profiles: profiles.into(),
        }
    }
}

impl PlayerGenerator for FixedGenerator {
    fn next_profile(&mut self) -> PlayerProfile {
        match self.profiles.pop_front() {
            Some(p) => {
                self.profiles.push_back(p.clone());
                p
            }
            None => profile("PLAYER", 100, Region::UsEast),
        }
    }
}

/// A match covering `ticket_ids`, one player per ticket on team "A".
pub fn match_event(match_id: &str, game_mode: &str, ticket_ids: &[&str]) -> MatchEvent {
    let players = ticket_ids
        .iter()
        .map(|id| PlayerSummary {
            player_name: format!("P_{id}"),
            skill: Some(100),
            region: Some("us-east".to_string()),
        })
        .collect();
    let mut teams = BTreeMap::new();
    teams.insert("A".to_string(), players);
    MatchEvent {
        match_id: match_id.to_string(),
        game_mode: game_mode.to_string(),
        region: "us-east".to_string(),
        ticket_ids: ticket_ids.iter().map(|s| s.to_string()).collect(),
        teams,
        timestamp: Some(Utc::now()),
    }
}

/// A running dashboard plus handles on all of its doubles.
pub struct Harness {
    pub handle: DashboardHandle,
    pub backend: Arc<FakeBackend>,
    pub sink: Arc<RecordingSink>,
    pub push: ScriptedPush,
    task: JoinHandle<()>,
}

impl Harness {
    pub fn start(backend: FakeBackend, generator: impl PlayerGenerator + 'static) -> Self {
        Self::start_with(&test_config(), backend, generator)
    }

    pub fn start_with(
        config: &DashboardConfig,
        backend: FakeBackend,
        generator: impl PlayerGenerator + 'static,
    ) -> Self {
        let backend = Arc::new(backend);
        let sink = Arc::new(RecordingSink::new());
        let (push, push_rx) = ScriptedPush::channel();
        let (handle, task) = spawn_dashboard(
            config,
            RuntimeDeps {
                backend: backend.clone(),
                sink: sink.clone(),
                generator: Box::new(generator),
                push: Some(push_rx),
            },
        );
        Self {
            handle,
            backend,
            sink,
            push,
            task,
        }
    }

    /// Wait for the startup catalog load to finish.
    pub async fn ready(&self) {
        self.sink.wait_for_log("> READY FOR PLAYER CONNECTIONS").await;
    }

    /// Send a marker through the push channel and wait for it to be rendered.
    /// Push frames are handled in order, so everything sent before the
    /// marker has been applied once this returns.
    pub async fn flush_push(&self, marker: &str) {
        self.push.dashboard_log(marker).await;
        self.sink.wait_for_log(&format!("BACKEND: {marker}")).await;
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        match self.handle.snapshot().await {
            Ok(s) => s,
            Err(e) => panic!("snapshot failed: {e}"),
        }
    }

    pub fn match_notifications(&self) -> usize {
        self.sink
            .count(|n| matches!(n, Notification::MatchFound { .. }))
    }

    /// Drop the handle and wait for the runtime task to exit.
    pub async fn shutdown(self) {
        let Harness { handle, task, .. } = self;
        drop(handle);
        let _ = task.await;
    }
}

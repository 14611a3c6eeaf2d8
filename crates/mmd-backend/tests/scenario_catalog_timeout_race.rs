//! Scenario: Catalog Timeout Race
//!
//! # Invariants under test
//!
//! 1. A catalog request hanging past the timeout leaves the fallback catalog
//!    active, non-empty, with the fallback log line emitted exactly once.
//! 2. A response that would resolve after the timeout is never applied: the
//!    request future is dropped and never completes.
//! 3. A response just inside the timeout wins.
//! 4. A transport failure falls back exactly like a timeout.
//!
//! Uses paused tokio time; no network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mmd_backend::{load_catalog, BackendApi, BackendError, CatalogSource};
use mmd_schemas::{
    GameMode, JoinQueueRequest, JoinQueueResponse, Notification, PoolSnapshot, SystemStatus,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Answers `list_game_modes` after `delay`, recording whether it completed.
struct SlowCatalog {
    delay: Duration,
    result: Result<Vec<GameMode>, BackendError>,
    calls: AtomicUsize,
    completed: Arc<AtomicBool>,
}

impl SlowCatalog {
    fn new(delay: Duration, result: Result<Vec<GameMode>, BackendError>) -> Self {
        Self {
            delay,
            result,
            calls: AtomicUsize::new(0),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl BackendApi for SlowCatalog {
    async fn list_game_modes(&self) -> Result<Vec<GameMode>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.store(true, Ordering::SeqCst);
        self.result.clone()
    }

    async fn join_queue(
        &self,
        _game_mode: &str,
        _req: &JoinQueueRequest,
    ) -> Result<JoinQueueResponse, BackendError> {
        unreachable!("not used by the catalog loader")
    }

    async fn system_status(&self) -> Result<SystemStatus, BackendError> {
        unreachable!("not used by the catalog loader")
    }

    async fn pool_status(&self) -> Result<PoolSnapshot, BackendError> {
        unreachable!("not used by the catalog loader")
    }
}

fn backend_modes() -> Vec<GameMode> {
    vec![GameMode::new("ranked_solo", "from backend")]
}

fn fallback_count(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| n.log_message() == Some("> USING FALLBACK GAME MODES"))
        .count()
}

#[tokio::test(start_paused = true)]
async fn hanging_request_falls_back_once() {
    let api = SlowCatalog::new(Duration::from_secs(3600), Ok(backend_modes()));
    let load = load_catalog(&api, TIMEOUT, Vec::new()).await;

    assert_eq!(load.catalog.source(), CatalogSource::Fallback);
    assert!(load.catalog.len() >= 1);
    assert_eq!(fallback_count(&load.notifications), 1);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    assert!(load.notifications.iter().any(|n| {
        n.log_message() == Some("[X] ERROR: Failed to load backend data - Backend request timeout")
    }));
}

#[tokio::test(start_paused = true)]
async fn late_response_is_never_applied() {
    let api = SlowCatalog::new(Duration::from_secs(6), Ok(backend_modes()));
    let completed = api.completed.clone();

    let load = load_catalog(&api, TIMEOUT, Vec::new()).await;
    assert!(load.catalog.is_fallback());

    // Let the would-be response time pass; the dropped future never resumes.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!completed.load(Ordering::SeqCst));
    assert!(!load.catalog.contains("ranked_solo"));
}

#[tokio::test(start_paused = true)]
async fn response_inside_timeout_wins() {
    let api = SlowCatalog::new(Duration::from_millis(4_900), Ok(backend_modes()));
    let load = load_catalog(&api, TIMEOUT, Vec::new()).await;
    assert_eq!(load.catalog.source(), CatalogSource::Backend);
    assert_eq!(load.catalog.default_mode().map(|m| m.key.as_str()), Some("ranked_solo"));
    assert_eq!(fallback_count(&load.notifications), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_falls_back() {
    let api = SlowCatalog::new(
        Duration::from_millis(10),
        Err(BackendError::Transport("connection refused".to_string())),
    );
    let fallback = vec![GameMode::new("only_mode", "configured")];
    let load = load_catalog(&api, TIMEOUT, fallback.clone()).await;
    assert_eq!(load.catalog.modes(), fallback.as_slice());
    assert_eq!(fallback_count(&load.notifications), 1);
}

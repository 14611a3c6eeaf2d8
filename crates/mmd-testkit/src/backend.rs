use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use mmd_backend::{BackendApi, BackendError};
use mmd_schemas::{
    GameMode, JoinQueueRequest, JoinQueueResponse, PoolSnapshot, SystemStatus, TicketRef,
};

/// How the fake answers `GET /game_modes`.
#[derive(Debug, Clone)]
pub enum CatalogScript {
    Modes(Vec<GameMode>),
    Fail(BackendError),
    /// Never resolves.
    Hang,
    /// Resolves with `modes` after `delay`.
    Delayed(Duration, Vec<GameMode>),
}

#[derive(Debug)]
enum JoinScript {
    Reply(Result<JoinQueueResponse, BackendError>),
    Hang,
}

/// Scripted in-memory backend used ONLY for tests.
///
/// Join requests are answered from a queue of scripted results; once the
/// queue is empty every join succeeds with a fresh `TKT-<n>` identifier.
/// Status and pool polls pop scripted results and fail with a transport
/// error when nothing is scripted.
#[derive(Debug)]
pub struct FakeBackend {
    catalog: Mutex<CatalogScript>,
    joins: Mutex<VecDeque<JoinScript>>,
    status: Mutex<VecDeque<Result<SystemStatus, BackendError>>>,
    pool: Mutex<VecDeque<Result<PoolSnapshot, BackendError>>>,
    join_requests: Mutex<Vec<(String, JoinQueueRequest)>>,
    next_ticket: AtomicU64,
    catalog_calls: AtomicUsize,
    status_calls: AtomicUsize,
    pool_calls: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new(CatalogScript::Modes(crate::standard_modes()))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FakeBackend {
    pub fn new(catalog: CatalogScript) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            joins: Mutex::new(VecDeque::new()),
            status: Mutex::new(VecDeque::new()),
            pool: Mutex::new(VecDeque::new()),
            join_requests: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
            catalog_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            pool_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_catalog(&self, script: CatalogScript) {
        *lock(&self.catalog) = script;
    }

    pub fn push_join(&self, result: Result<JoinQueueResponse, BackendError>) {
        lock(&self.joins).push_back(JoinScript::Reply(result));
    }

    /// The next join request never resolves.
    pub fn push_join_hang(&self) {
        lock(&self.joins).push_back(JoinScript::Hang);
    }

    pub fn push_status(&self, result: Result<SystemStatus, BackendError>) {
        lock(&self.status).push_back(result);
    }

    pub fn push_pool(&self, result: Result<PoolSnapshot, BackendError>) {
        lock(&self.pool).push_back(result);
    }

    /// Every `(game_mode, request)` received so far.
    pub fn join_requests(&self) -> Vec<(String, JoinQueueRequest)> {
        lock(&self.join_requests).clone()
    }

    pub fn join_calls(&self) -> usize {
        lock(&self.join_requests).len()
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn pool_calls(&self) -> usize {
        self.pool_calls.load(Ordering::SeqCst)
    }

    /// Total backend calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.catalog_calls() + self.join_calls() + self.status_calls() + self.pool_calls()
    }
}

pub fn ticket_response(id: impl Into<String>) -> JoinQueueResponse {
    JoinQueueResponse {
        ticket: Some(TicketRef { ticket: id.into() }),
        player_id: None,
    }
}

#[async_trait]
impl BackendApi for FakeBackend {
    async fn list_game_modes(&self) -> Result<Vec<GameMode>, BackendError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.catalog).clone();
        match script {
            CatalogScript::Modes(modes) => Ok(modes),
            CatalogScript::Fail(err) => Err(err),
            CatalogScript::Hang => std::future::pending().await,
            CatalogScript::Delayed(delay, modes) => {
                tokio::time::sleep(delay).await;
                Ok(modes)
            }
        }
    }

    async fn join_queue(
        &self,
        game_mode: &str,
        req: &JoinQueueRequest,
    ) -> Result<JoinQueueResponse, BackendError> {
        lock(&self.join_requests).push((game_mode.to_string(), req.clone()));
        let scripted = lock(&self.joins).pop_front();
        match scripted {
            Some(JoinScript::Reply(result)) => return result,
            Some(JoinScript::Hang) => return std::future::pending().await,
            None => {}
        }
        let n = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        Ok(ticket_response(format!("TKT-{n}")))
    }

    async fn system_status(&self) -> Result<SystemStatus, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.status)
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no scripted status".to_string())))
    }

    async fn pool_status(&self) -> Result<PoolSnapshot, BackendError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.pool)
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Transport("no scripted pool".to_string())))
    }
}

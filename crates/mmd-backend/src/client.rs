use std::time::Duration;

use async_trait::async_trait;
use mmd_schemas::{
    ErrorBody, GameMode, GameModesResponse, JoinQueueRequest, JoinQueueResponse, PoolSnapshot,
    SystemStatus, SystemStatusResponse,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::BackendError;

/// Matchmaking backend REST surface.
///
/// Object-safe so callers can hold an `Arc<dyn BackendApi>`.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /game_modes`, in the backend's key order.
    async fn list_game_modes(&self) -> Result<Vec<GameMode>, BackendError>;

    /// `POST /join_queue?gameMode=<key>`
    async fn join_queue(
        &self,
        game_mode: &str,
        req: &JoinQueueRequest,
    ) -> Result<JoinQueueResponse, BackendError>;

    /// `GET /system_status`
    async fn system_status(&self) -> Result<SystemStatus, BackendError>;

    /// `GET /pool_status`
    async fn pool_status(&self) -> Result<PoolSnapshot, BackendError>;
}

/// reqwest-backed client rooted at the configured API base
/// (e.g. `http://localhost:8000/api/v2`).
///
/// Every request, body included, is bounded by `request_timeout`; a backend
/// that accepts the connection and never answers yields
/// [`BackendError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn transport(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.request_timeout)
        } else {
            BackendError::Transport(err.to_string())
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        self.decode(resp).await
    }

    /// Map a response to `T`, or to [`BackendError::Http`] carrying the
    /// backend's `detail` for non-2xx statuses.
    async fn decode<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| self.transport(e))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.detail_text())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(BackendError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn list_game_modes(&self) -> Result<Vec<GameMode>, BackendError> {
        let body: GameModesResponse = self.get_json("game_modes").await?;
        body.into_modes()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn join_queue(
        &self,
        game_mode: &str,
        req: &JoinQueueRequest,
    ) -> Result<JoinQueueResponse, BackendError> {
        let url = self.url("join_queue");
        debug!(%url, game_mode, player = %req.player_name, "POST");
        let resp = self
            .http
            .post(url)
            .query(&[("gameMode", game_mode)])
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        self.decode(resp).await
    }

    async fn system_status(&self) -> Result<SystemStatus, BackendError> {
        let body: SystemStatusResponse = self.get_json("system_status").await?;
        Ok(body.system)
    }

    async fn pool_status(&self) -> Result<PoolSnapshot, BackendError> {
        self.get_json("pool_status").await
    }
}

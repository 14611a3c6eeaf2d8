//! Axum router and all HTTP handlers for mmd-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler forwards to the [`DashboardHandle`] and
//! maps [`DashboardError`] onto a status code.
//!
//! [`DashboardHandle`]: mmd_runtime::DashboardHandle

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use mmd_runtime::DashboardError;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{
        ClearResponse, ErrorResponse, HealthResponse, ModesResponse, OkResponse, ReloadResponse,
        SelectModeRequest,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/stream", get(stream))
        .route("/v1/modes", get(modes))
        .route("/v1/modes/select", post(select_mode))
        .route("/v1/modes/reload", post(reload_modes))
        .route("/v1/players/:slot", get(get_ticket).post(submit_player))
        .route("/v1/pool/clear", post(clear_pool))
        .route("/v1/match/run", post(run_match))
        .route("/v1/history", get(history))
        .route("/v1/reset", post(reset))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
        DashboardError::State(_) => StatusCode::CONFLICT,
        DashboardError::Backend { .. } => StatusCode::BAD_GATEWAY,
        DashboardError::Transport(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn error_response(status: StatusCode, err: &DashboardError) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
    )
        .into_response()
}

fn refuse(err: DashboardError) -> Response {
    error_response(status_for(&err), &err)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/dashboard
// ---------------------------------------------------------------------------

pub(crate) async fn dashboard(State(st): State<Arc<AppState>>) -> Response {
    match st.dashboard.snapshot().await {
        Ok(snap) => (StatusCode::OK, Json(snap)).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// /v1/modes
// ---------------------------------------------------------------------------

pub(crate) async fn modes(State(st): State<Arc<AppState>>) -> Response {
    match st.dashboard.snapshot().await {
        Ok(snap) => (
            StatusCode::OK,
            Json(ModesResponse {
                modes: snap.modes,
                selected: snap.selected_mode,
                source: snap.catalog_source,
            }),
        )
            .into_response(),
        Err(e) => refuse(e),
    }
}

pub(crate) async fn select_mode(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SelectModeRequest>,
) -> Response {
    info!(mode = %req.mode, "modes/select");
    match st.dashboard.select_mode(req.mode).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(e) => refuse(e),
    }
}

pub(crate) async fn reload_modes(State(st): State<Arc<AppState>>) -> Response {
    info!("modes/reload");
    match st.dashboard.reload_catalog().await {
        Ok(source) => (StatusCode::OK, Json(ReloadResponse { source })).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// /v1/players/:slot
// ---------------------------------------------------------------------------

pub(crate) async fn submit_player(
    State(st): State<Arc<AppState>>,
    Path(slot): Path<u32>,
) -> Response {
    info!(slot, "players/submit");
    match st.dashboard.submit(slot).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => refuse(e),
    }
}

pub(crate) async fn get_ticket(State(st): State<Arc<AppState>>, Path(slot): Path<u32>) -> Response {
    match st.dashboard.ticket(slot).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e @ DashboardError::State(_)) => error_response(StatusCode::NOT_FOUND, &e),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// Local-only operations
// ---------------------------------------------------------------------------

pub(crate) async fn clear_pool(State(st): State<Arc<AppState>>) -> Response {
    match st.dashboard.clear().await {
        Ok(removed) => {
            info!(removed, "pool/clear");
            (StatusCode::OK, Json(ClearResponse { removed })).into_response()
        }
        Err(e) => refuse(e),
    }
}

pub(crate) async fn run_match(State(st): State<Arc<AppState>>) -> Response {
    match st.dashboard.run_match().await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(e) => refuse(e),
    }
}

pub(crate) async fn reset(State(st): State<Arc<AppState>>) -> Response {
    info!("reset");
    match st.dashboard.reset().await {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/history  (JSON Lines)
// ---------------------------------------------------------------------------

pub(crate) async fn history(State(st): State<Arc<AppState>>) -> Response {
    match st.dashboard.export_history().await {
        Ok(jsonl) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-ndjson")],
            jsonl,
        )
            .into_response(),
        Err(e) => refuse(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

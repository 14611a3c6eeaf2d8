//! mmd-daemon entry point.
//!
//! Thin: sets up tracing, loads configuration, starts the dashboard runtime
//! with the HTTP backend and websocket transport, wires middleware, and
//! starts the HTTP server. Route handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use mmd_backend::HttpBackend;
use mmd_config::{apply_env_overrides, load_layered_yaml, LoadedConfig};
use mmd_daemon::{routes, state};
use mmd_push::WsTransport;
use mmd_runtime::RandomGenerator;
use tokio::sync::mpsc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// Comma-separated YAML paths, later files override earlier ones.
const ENV_CONFIG: &str = "MMD_CONFIG";
const ENV_ADDR: &str = "MMD_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config().context("load config")?;
    let cfg = &loaded.config;
    info!(
        config_hash = %loaded.config_hash,
        api_base = %cfg.backend.api_base,
        push_url = %cfg.backend.push_url,
        "configuration loaded"
    );

    let backend = Arc::new(
        HttpBackend::new(cfg.backend.api_base.clone(), cfg.timing.request_timeout())
            .context("build backend client")?,
    );
    let (push_tx, push_rx) = mpsc::channel(256);
    let _transport =
        WsTransport::new(cfg.backend.push_url.clone(), cfg.backend.client_id.clone()).spawn(push_tx);

    let (shared, _runtime) = state::AppState::start(
        cfg,
        backend,
        Box::new(RandomGenerator::from_config(&cfg.simulation)),
        Some(push_rx),
        Some(loaded.config_hash.clone()),
    );

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("mmd-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    apply_env_overrides(load_layered_yaml(&paths)?)
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}

//! Spotify Auth Bridge
//!
//! Single-binary Rust service that bridges public PKCE clients onto a
//! confidential-client OAuth provider:
//! 1. Presents a PKCE authorization server to clients (`/authorize`,
//!    `/token`, discovery documents)
//! 2. Runs the confidential code-exchange leg against the upstream
//!    provider, holding the client secret server-side
//! 3. Issues opaque RS tokens backed by an in-memory vault, refreshing
//!    the mirrored upstream tokens on demand

mod authorize;
mod callback;
mod config;
mod discovery;
mod error;
mod metrics;
mod redirect;
mod token;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotify_auth::{CALLBACK_PATH, UpstreamClient, derive_key};
use token_store::{SWEEP_INTERVAL, SessionStore, TokenVault, TransactionStore, spawn_sweep_task};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    transactions: Arc<TransactionStore>,
    sessions: Arc<SessionStore>,
    vault: Arc<TokenVault>,
    upstream: Arc<UpstreamClient>,
    /// AES key for sealing/opening composite state, derived once at startup
    state_key: [u8; 32],
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::authorization_server_metadata),
        )
        .route(
            "/.well-known/openid-configuration",
            get(discovery::openid_configuration),
        )
        .route("/authorize", get(authorize::authorize))
        .route(CALLBACK_PATH, get(callback::callback))
        .route("/token", post(token::token))
        .route("/revoke", post(token::revoke))
        .route("/register", post(discovery::register))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting spotify-auth-bridge");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        public_url = %config.server.public_url,
        authorize_endpoint = %config.upstream.authorize_endpoint,
        token_endpoint = %config.upstream.token_endpoint,
        allowed_redirects = config.redirects.allowed.len(),
        allow_loopback = config.redirects.allow_loopback,
        "configuration loaded"
    );

    let client_secret = config
        .upstream
        .client_secret
        .clone()
        .context("client secret missing after config load")?;
    let state_secret = config
        .server
        .state_secret
        .clone()
        .context("state secret missing after config load")?;
    let state_key = derive_key(state_secret.expose().as_bytes());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let upstream = Arc::new(UpstreamClient::new(
        http,
        config.upstream.token_endpoint.clone(),
        config.upstream.revocation_endpoint.clone(),
        config.upstream.client_id.clone(),
        client_secret,
    ));

    let transactions = Arc::new(TransactionStore::default());
    spawn_sweep_task(transactions.clone(), SWEEP_INTERVAL);

    let listen_addr = config.server.listen_addr;
    let max_connections = config.server.max_connections;

    let app_state = AppState {
        config: Arc::new(config),
        transactions,
        sessions: Arc::new(SessionStore::new()),
        vault: Arc::new(TokenVault::new()),
        upstream,
        state_key,
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: JSON with status, uptime, and store sizes.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "transactions_pending": state.transactions.len().await,
        "sessions": state.sessions.len().await,
        "vault_records": state.vault.len().await,
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

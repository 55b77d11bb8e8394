//! Process assembly: tracing init, router wiring, bind, and the
//! signal-driven graceful shutdown sweep.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, PersistedConfig};
use crate::state::AppState;

/// Initialize tracing from `config`. Uses `try_init` so it's safe to call
/// more than once (tests call it too).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    // Priority: --log-level / AGENT_LOG_LEVEL > RUST_LOG > "info".
    let filter = if std::env::var("AGENT_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // --log-format / AGENT_LOG_FORMAT still wins if set explicitly; NODE_ENV
    // only picks a default when the format is left at its "json" default,
    // so a local `NODE_ENV=development` run gets human-readable text instead.
    let format = if config.log_format == "json" && is_dev_env() { "text" } else { config.log_format.as_str() };

    let result = match format {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

fn is_dev_env() -> bool {
    matches!(std::env::var("NODE_ENV").as_deref(), Ok("development") | Ok("dev"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
}

async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running" })
}

/// Ready once the router has handlers wired and the config is loaded —
/// both happen synchronously before the listener binds, so this is
/// unconditionally true for any request the server can actually answer.
async fn ready(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ReadyResponse { ready: true })
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(crate::bus::ws::ws_handler))
        .route("/api/v1/health", get(health))
        .route("/api/v1/ready", get(ready))
        .with_state(state)
}

/// Run the agent to completion: load config, wire the bus, bind, and serve
/// until a shutdown signal arrives. Returns once shutdown has finished
/// tearing down every live PTY, tunnel, and browser session.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);

    let config_path = config.resolved_config_path();
    let persisted = PersistedConfig::load(&config_path).await;
    let state = AppState::new(&config, persisted).await?;
    crate::setup::register_handlers(&state.router, &state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);

    let router = build_router(state.clone());
    let shutdown = state.shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;
        if let Err(e) = result {
            error!("HTTP server error: {e}");
        }
    });

    wait_for_shutdown_signal().await;
    state.shutdown.cancel();
    let _ = server.await;

    info!("shutting down: destroying all PTY, persistence, and browser sessions");
    state.destroy_all().await;

    Ok(())
}

/// Waits for the first SIGINT/SIGTERM, then races a second one that forces
/// an immediate exit rather than waiting on a shutdown sweep that's stuck.
async fn wait_for_shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

    tokio::select! {
        _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGTERM");
        }
        _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGINT");
        }
    }

    let force_exit = async {
        tokio::select! {
            _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    };

    tokio::spawn(force_exit);
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

use clap::Parser;

use super::*;
use crate::config::{Config, PersistedConfig};

async fn spawn_test_server() -> u16 {
    let config = Config::parse_from(["vibepilot-agent"]);
    let state = AppState::new(&config, PersistedConfig::default()).await.unwrap();
    crate::setup::register_handlers(&state.router, &state);
    let router = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

#[tokio::test]
async fn health_endpoint_reports_running() {
    let port = spawn_test_server().await;
    let body = reqwest::get(format!("http://127.0.0.1:{port}/api/v1/health")).await.unwrap().text().await.unwrap();
    assert!(body.contains("running"));
}

#[tokio::test]
async fn ready_endpoint_reports_ready() {
    let port = spawn_test_server().await;
    let body = reqwest::get(format!("http://127.0.0.1:{port}/api/v1/ready")).await.unwrap().text().await.unwrap();
    assert!(body.contains("true"));
}

#[test]
fn init_tracing_does_not_panic_when_called_more_than_once() {
    let config = Config::parse_from(["vibepilot-agent"]);
    init_tracing(&config);
    init_tracing(&config);
}

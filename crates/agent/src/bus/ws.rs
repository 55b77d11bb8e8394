//! `GET /ws`: the primary transport's axum entry point. Frames arrive as
//! JSON text messages, get decoded into [`Frame`], and handed to the
//! router; outbound frames enqueued on the transport hub are re-encoded
//! and written back out over the same socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::wire::Frame;

pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    state.transport.connect_primary(outbound_tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<Frame>(&text) {
                Ok(frame) => state.router.route(frame),
                Err(e) => tracing::debug!(error = %e, "dropping malformed inbound frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.transport.disconnect_primary();
    state.orphan_all_attached();
    writer.abort();
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;

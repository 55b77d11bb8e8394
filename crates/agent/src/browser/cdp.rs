//! CDP Client (C5): request/response correlation plus event fan-out over a
//! WebSocket connection to a Chrome DevTools Protocol target.
//!
//! Discovery is a plain HTTP `GET /json/version` (or `/json/new`) against
//! the `--remote-debugging-port` Chrome was launched with; the returned
//! `webSocketDebuggerUrl` is then dialed with `tokio-tungstenite`. A single
//! reader task demultiplexes inbound frames by `id` (completing a oneshot
//! request waiter) or by `method` (fanning out to event subscribers).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::error::AgentError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, serde::Deserialize)]
struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct TargetInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Discover the websocket debugger URL for a fresh page target, by opening
/// one via `/json/new`.
pub async fn discover_new_page(remote_debugging_port: u16, url: &str) -> Result<String, AgentError> {
    let endpoint = format!("http://127.0.0.1:{remote_debugging_port}/json/new?{url}");
    let response = reqwest::Client::new()
        .put(&endpoint)
        .send()
        .await
        .map_err(|e| AgentError::resource(format!("cdp discovery failed: {e}")))?;
    let target: TargetInfo =
        response.json().await.map_err(|e| AgentError::resource(format!("bad /json/new response: {e}")))?;
    Ok(target.web_socket_debugger_url)
}

/// Discover the browser-level websocket endpoint via `/json/version`.
pub async fn discover_browser_endpoint(remote_debugging_port: u16) -> Result<String, AgentError> {
    let endpoint = format!("http://127.0.0.1:{remote_debugging_port}/json/version");
    let response = reqwest::Client::new()
        .get(&endpoint)
        .send()
        .await
        .map_err(|e| AgentError::resource(format!("cdp discovery failed: {e}")))?;
    let info: VersionInfo =
        response.json().await.map_err(|e| AgentError::resource(format!("bad /json/version response: {e}")))?;
    Ok(info.web_socket_debugger_url)
}

type Waiters = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, AgentError>>>>>;
type EventSubscribers = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>>;

/// A connected CDP session. Cloning shares the same socket writer and
/// dispatch tables.
#[derive(Clone)]
pub struct CdpClient {
    outbound: mpsc::Sender<Message>,
    next_id: Arc<AtomicU64>,
    waiters: Waiters,
    subscribers: EventSubscribers,
}

impl CdpClient {
    pub async fn connect(websocket_url: &str) -> Result<Self, AgentError> {
        let (stream, _response) =
            tokio_tungstenite::connect_async(websocket_url).await.map_err(|e| AgentError::resource(format!("cdp connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(256);
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: EventSubscribers = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let reader_waiters = waiters.clone();
        let reader_subscribers = subscribers.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        dispatch_inbound(&text, &reader_waiters, &reader_subscribers).await;
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            // Socket closed or reader died: fail every still-pending waiter.
            for (_, sender) in reader_waiters.lock().drain() {
                let _ = sender.send(Err(AgentError::resource("cdp socket closed")));
            }
        });

        Ok(Self { outbound: outbound_tx, next_id: Arc::new(AtomicU64::new(1)), waiters, subscribers })
    }

    /// Issue a CDP method call and await its result, independently timing
    /// out if Chrome never responds.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(id, tx);

        let frame = serde_json::json!({ "id": id, "method": method, "params": params });
        let text = serde_json::to_string(&frame).map_err(|e| AgentError::fatal(format!("encode cdp call: {e}")))?;

        if self.outbound.send(Message::Text(text.into())).await.is_err() {
            self.waiters.lock().remove(&id);
            return Err(AgentError::resource("cdp socket closed"));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AgentError::resource("cdp socket closed")),
            Err(_) => {
                self.waiters.lock().remove(&id);
                Err(AgentError::transient(format!("cdp call '{method}' timed out")))
            }
        }
    }

    /// Subscribe to a CDP event by method name (e.g. `Page.screencastFrame`).
    pub fn subscribe(&self, method: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().entry(method.to_owned()).or_default().push(tx);
        rx
    }
}

async fn dispatch_inbound(text: &str, waiters: &Waiters, subscribers: &EventSubscribers) {
    let Ok(value) = serde_json::from_str::<Value>(text) else { return };

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let waiter = waiters.lock().remove(&id);
        if let Some(waiter) = waiter {
            let result = match value.get("error") {
                Some(err) => Err(AgentError::resource(err.to_string())),
                None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
            };
            let _ = waiter.send(result);
        }
        return;
    }

    if let Some(method) = value.get("method").and_then(Value::as_str) {
        let params = value.get("params").cloned().unwrap_or(Value::Null);
        let mut subscribers = subscribers.lock();
        if let Some(listeners) = subscribers.get_mut(method) {
            listeners.retain(|tx| tx.try_send(params.clone()).is_ok() || !tx.is_closed());
        }
    }
}

#[cfg(test)]
#[path = "cdp_tests.rs"]
mod tests;

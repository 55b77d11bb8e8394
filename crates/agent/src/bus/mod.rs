//! Message Bus / Router (C15): per-frame-type dispatch over one bidirectional
//! transport. Each frame type gets its own FIFO lane so a flood of
//! `terminal:output` can never starve `browser:input`, while delivery order
//! within a single type is always preserved.

pub mod transport;
pub mod ws;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::wire::{error_type_for, Frame};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Sends a frame out over whichever transport is currently active. Cheap
/// and non-blocking: it only enqueues onto the transport's outbound channel.
pub type Outbound = Arc<dyn Fn(Frame) + Send + Sync>;

/// A per-frame-type handler. Receives the frame and a handle to send
/// replies/events back out; returns `Err` to have the router translate and
/// emit a `<domain>:error` frame on its behalf.
pub type Handler = Arc<dyn Fn(Frame, Outbound) -> BoxFuture<Result<(), AgentError>> + Send + Sync>;

struct Lane {
    tx: mpsc::UnboundedSender<Frame>,
    handlers: Arc<Mutex<Vec<Handler>>>,
}

/// Holds the type → handler-set mapping and the per-type FIFO lanes that
/// back it. Registration only ever appends to in-memory state; no I/O
/// happens until a frame is actually routed.
pub struct Router {
    lanes: Mutex<HashMap<String, Lane>>,
    outbound: Outbound,
}

impl Router {
    pub fn new(outbound: Outbound) -> Self {
        Self { lanes: Mutex::new(HashMap::new()), outbound }
    }

    /// Register `handler` for `frame_type`. Handlers for the same type run
    /// in the insertion order they were registered in.
    pub fn register(&self, frame_type: impl Into<String>, handler: Handler) {
        let frame_type = frame_type.into();
        let mut lanes = self.lanes.lock();
        let lane = lanes.entry(frame_type.clone()).or_insert_with(|| self.spawn_lane(frame_type));
        lane.handlers.lock().push(handler);
    }

    fn spawn_lane(&self, frame_type: String) -> Lane {
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let handlers: Arc<Mutex<Vec<Handler>>> = Arc::new(Mutex::new(Vec::new()));
        let handlers_for_task = handlers.clone();
        let outbound = self.outbound.clone();

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let snapshot: Vec<Handler> = handlers_for_task.lock().clone();
                for handler in &snapshot {
                    if let Err(err) = handler(frame.clone(), outbound.clone()).await {
                        tracing::warn!(frame_type = %frame_type, error = %err, "handler failed");
                        outbound(domain_error_frame(&frame_type, err.message()));
                    }
                }
            }
        });

        Lane { tx, handlers }
    }

    /// Route an inbound frame onto its type's lane. A frame type with no
    /// registered handler is dropped silently — the ambient stack doesn't
    /// treat an unrecognized frame as fatal.
    pub fn route(&self, frame: Frame) {
        let type_tag = frame.type_tag();
        let lanes = self.lanes.lock();
        if let Some(lane) = lanes.get(type_tag) {
            let _ = lane.tx.send(frame);
        }
    }
}

/// Translate a handler failure into the `<domain>:error` frame shape wire.rs
/// defines for that domain. Domains whose error frame carries extra
/// correlating fields (`tunnel:error`'s `tunnel_id`, `file:error`'s
/// implicit path) are expected to emit their own frame via `outbound`
/// before returning `Err`; this fallback only covers the flat `{error}`
/// shapes so a bug in a handler never leaves the client without *any*
/// response.
fn domain_error_frame(type_tag: &str, message: String) -> Frame {
    match error_type_for(type_tag).as_str() {
        "terminal:error" => Frame::TerminalError { error: message },
        "file:error" => Frame::FileError { error: message },
        "browser:error" => Frame::BrowserError { error: message },
        "project:error" => Frame::ProjectError { error: message },
        "tunnel:error" => Frame::TunnelError { tunnel_id: String::new(), error: message },
        _ => Frame::FileError { error: message },
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

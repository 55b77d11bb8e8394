//! Attach/detach sink over a stable producer handle (spec §3, §4.2).
//!
//! The PTY backend holds a single, permanently-bound [`OutputDelegate`] for
//! its lifetime and calls [`OutputDelegate::produce`] for every chunk of
//! shell output. Whatever transport currently owns the session calls
//! [`OutputDelegate::attach`]/[`detach`] as the client disconnects and
//! reconnects; no byte produced while detached is ever lost, because it
//! lands in the ring buffer instead of being dropped.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::ring::RingBuffer;

/// A sink that receives produced output. Implemented by whatever currently
/// owns the session (a bus connection, a test harness, ...).
pub trait OutputSink: Send + Sync {
    /// Forward `data` downstream. Errors are the sink's own concern — the
    /// delegate never aborts because a sink failed.
    fn send(&self, data: &[u8]) -> Result<(), String>;
}

struct Inner {
    sink: Option<Arc<dyn OutputSink>>,
    buffer: RingBuffer,
}

/// Stable handle bound once per PTY session. Cloning shares the same
/// underlying state — the producer side and the attach/detach side are
/// both clones of the same delegate.
#[derive(Clone)]
pub struct OutputDelegate {
    inner: Arc<Mutex<Inner>>,
}

impl OutputDelegate {
    pub fn new(buffer_capacity: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { sink: None, buffer: RingBuffer::new(buffer_capacity) })) }
    }

    /// Called by the producer (the PTY backend) for every chunk of output.
    /// Forwards live if a sink is attached, otherwise buffers.
    pub fn produce(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        match inner.sink.clone() {
            Some(sink) => {
                // A sink error is the sink's problem; the delegate keeps running.
                let _ = sink.send(data);
            }
            None => inner.buffer.write(data),
        }
    }

    /// Attach `sink`, draining and returning whatever was buffered while
    /// detached so the new consumer can replay it.
    pub fn attach(&self, sink: Arc<dyn OutputSink>) -> Vec<u8> {
        let mut inner = self.inner.lock();
        let buffered = inner.buffer.drain();
        inner.sink = Some(sink);
        buffered
    }

    /// Detach the current sink, if any. The handler (and anything produced
    /// afterward) keeps running — it now lands in the buffer.
    pub fn detach(&self) {
        self.inner.lock().sink = None;
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().sink.is_some()
    }
}

#[cfg(test)]
#[path = "output_delegate_tests.rs"]
mod tests;

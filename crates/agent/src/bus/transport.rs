//! Transport Abstraction (C16): a streaming socket (primary) and an
//! out-of-band peer data channel (secondary) both feed the same router;
//! exactly one is "active" for outbound sends, published under an atomic so
//! handlers never see which transport carries a given frame.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::wire::Frame;

const DISCONNECTED: u8 = 0;
const PRIMARY: u8 = 1;
const SECONDARY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTransport {
    Disconnected,
    Primary,
    Secondary,
}

impl From<u8> for ActiveTransport {
    fn from(value: u8) -> Self {
        match value {
            PRIMARY => Self::Primary,
            SECONDARY => Self::Secondary,
            _ => Self::Disconnected,
        }
    }
}

/// Publishes which transport outbound frames are currently enqueued onto,
/// and holds each transport's outbound sender. Handlers only ever see the
/// bus's [`crate::bus::Outbound`] closure, never this struct.
pub struct TransportHub {
    active: AtomicU8,
    primary: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    secondary: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

impl Default for TransportHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportHub {
    pub fn new() -> Self {
        Self { active: AtomicU8::new(DISCONNECTED), primary: Mutex::new(None), secondary: Mutex::new(None) }
    }

    pub fn active(&self) -> ActiveTransport {
        ActiveTransport::from(self.active.load(Ordering::Acquire))
    }

    /// A new primary connection is always promoted active; this is the
    /// "reachable, so prefer it" half of failover.
    pub fn connect_primary(&self, sender: mpsc::UnboundedSender<Frame>) {
        *self.primary.lock() = Some(sender);
        self.active.store(PRIMARY, Ordering::Release);
    }

    /// Primary closed: demote to disconnected, unless the secondary is
    /// already carrying traffic.
    pub fn disconnect_primary(&self) {
        self.primary.lock().take();
        if self.active.load(Ordering::Acquire) == PRIMARY {
            let fallback = if self.secondary.lock().is_some() { SECONDARY } else { DISCONNECTED };
            self.active.store(fallback, Ordering::Release);
        }
    }

    /// A secondary handshake succeeded: promote it active until the primary
    /// reconnects.
    pub fn connect_secondary(&self, sender: mpsc::UnboundedSender<Frame>) {
        *self.secondary.lock() = Some(sender);
        if self.active.load(Ordering::Acquire) != PRIMARY {
            self.active.store(SECONDARY, Ordering::Release);
        }
    }

    pub fn disconnect_secondary(&self) {
        self.secondary.lock().take();
        if self.active.load(Ordering::Acquire) == SECONDARY {
            self.active.store(DISCONNECTED, Ordering::Release);
        }
    }

    /// Enqueue `frame` onto whichever transport is currently active. A
    /// frame sent while disconnected is dropped — there is nowhere for it
    /// to go and outbound sends never block waiting for a reconnect.
    pub fn send(&self, frame: Frame) {
        let sender = match self.active() {
            ActiveTransport::Primary => self.primary.lock().clone(),
            ActiveTransport::Secondary => self.secondary.lock().clone(),
            ActiveTransport::Disconnected => None,
        };
        if let Some(sender) = sender {
            let _ = sender.send(frame);
        }
    }

    /// Build the [`crate::bus::Outbound`] closure the router uses; it never
    /// learns which concrete transport a send went through.
    pub fn outbound(self: &Arc<Self>) -> crate::bus::Outbound {
        let hub = self.clone();
        Arc::new(move |frame| hub.send(frame))
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

//! Session Persistence Manager (C11): tracks shells whose client has
//! disconnected, armed with a single-shot expiry timer so a reconnecting
//! client can reclaim the session before it's torn down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::pty::PtyManager;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct OrphanRecord {
    pub last_cwd: Option<String>,
}

struct Entry {
    record: OrphanRecord,
    cancel: CancellationToken,
}

/// Called when an orphaned session's timer fires without being reclaimed.
pub type ExpireHandler = Arc<dyn Fn(&str) + Send + Sync>;

pub struct PersistenceManager {
    orphans: Mutex<HashMap<String, Entry>>,
    timeout: Duration,
    pty: Arc<PtyManager>,
    on_expire: ExpireHandler,
}

impl PersistenceManager {
    pub fn new(pty: Arc<PtyManager>, timeout: Duration, on_expire: ExpireHandler) -> Self {
        Self { orphans: Mutex::new(HashMap::new()), timeout, pty, on_expire }
    }

    /// Mark `session_id` orphaned and arm its expiry timer. Duplicate calls
    /// for an already-orphaned session are ignored.
    pub fn orphan(self: &Arc<Self>, session_id: &str, last_cwd: Option<String>) {
        let mut orphans = self.orphans.lock();
        if orphans.contains_key(session_id) {
            return;
        }

        let cancel = CancellationToken::new();
        orphans.insert(session_id.to_owned(), Entry { record: OrphanRecord { last_cwd }, cancel: cancel.clone() });
        drop(orphans);

        let this = self.clone();
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(this.timeout) => {
                    this.expire(&session_id);
                }
            }
        });
    }

    /// Cancel the timer and return the orphan record, or `None` if the
    /// session was not orphaned.
    pub fn reclaim(&self, session_id: &str) -> Option<OrphanRecord> {
        let mut orphans = self.orphans.lock();
        let entry = orphans.remove(session_id)?;
        entry.cancel.cancel();
        Some(entry.record)
    }

    /// The shell already exited on its own while orphaned: cancel the timer
    /// and drop the record without destroying anything.
    pub fn handle_orphaned_exit(&self, session_id: &str) {
        let mut orphans = self.orphans.lock();
        if let Some(entry) = orphans.remove(session_id) {
            entry.cancel.cancel();
        }
    }

    fn expire(&self, session_id: &str) {
        let existed = self.orphans.lock().remove(session_id).is_some();
        if !existed {
            return;
        }
        self.pty.destroy(session_id);
        (self.on_expire)(session_id);
    }

    pub fn is_orphaned(&self, session_id: &str) -> bool {
        self.orphans.lock().contains_key(session_id)
    }

    /// Cancel all timers and destroy every orphaned shell.
    pub fn destroy_all(&self) {
        let entries: Vec<(String, Entry)> = self.orphans.lock().drain().collect();
        for (session_id, entry) in entries {
            entry.cancel.cancel();
            self.pty.destroy(&session_id);
        }
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;

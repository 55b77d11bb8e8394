//! Image Receiver (C14): reassembles a chunked base64 upload into a file
//! in a process-unique temp directory, under a randomized name so the
//! client's original filename never touches the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use rand::distr::Alphanumeric;
use rand::Rng;
use tempfile::TempDir;

use crate::error::AgentError;

struct Transfer {
    filename: String,
    total_size: u64,
    chunks: HashMap<u32, String>,
}

pub struct ImageReceiver {
    temp_dir: TempDir,
    transfers: parking_lot::Mutex<HashMap<String, Transfer>>,
}

impl ImageReceiver {
    /// Creates a process-unique temp directory (`mkdtemp` semantics).
    pub fn init() -> Result<Self, AgentError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("vibepilot-image-")
            .tempdir()
            .map_err(|e| AgentError::resource(format!("mkdtemp failed: {e}")))?;
        Ok(Self { temp_dir, transfers: parking_lot::Mutex::new(HashMap::new()) })
    }

    pub fn start_transfer(&self, transfer_id: &str, filename: &str, total_size: u64) {
        self.transfers.lock().insert(
            transfer_id.to_owned(),
            Transfer { filename: filename.to_owned(), total_size, chunks: HashMap::new() },
        );
    }

    pub fn add_chunk(&self, transfer_id: &str, index: u32, data: &str) -> Result<(), AgentError> {
        let mut transfers = self.transfers.lock();
        let transfer = transfers
            .get_mut(transfer_id)
            .ok_or_else(|| AgentError::user(format!("unknown transfer: {transfer_id}")))?;
        transfer.chunks.insert(index, data.to_owned());
        Ok(())
    }

    /// Sorts chunks by index, decodes, writes mode-0600 to a randomized
    /// path, and drops the in-memory transfer state.
    pub fn complete(&self, transfer_id: &str) -> Result<PathBuf, AgentError> {
        let transfer = self
            .transfers
            .lock()
            .remove(transfer_id)
            .ok_or_else(|| AgentError::user(format!("unknown transfer: {transfer_id}")))?;

        let mut indices: Vec<u32> = transfer.chunks.keys().copied().collect();
        indices.sort_unstable();

        let mut encoded = String::new();
        for index in indices {
            encoded.push_str(&transfer.chunks[&index]);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AgentError::user(format!("bad base64 data: {e}")))?;

        let _ = transfer.total_size;
        let ext = Path::new(&transfer.filename).extension().and_then(|e| e.to_str()).unwrap_or("");
        let random_id: String = rand::rng().sample_iter(Alphanumeric).take(16).map(char::from).collect();
        let name = if ext.is_empty() { random_id } else { format!("{random_id}.{ext}") };
        let path = self.temp_dir.path().join(name);

        std::fs::write(&path, &bytes).map_err(|e| AgentError::resource(format!("write failed: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| AgentError::resource(format!("chmod failed: {e}")))?;
        }

        Ok(path)
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;

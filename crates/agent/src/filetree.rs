//! File Tree & Content (C12): path-confined directory listing and flat
//! file read/write, backing the `filetree:*`/`file:*` bus messages.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

const IGNORED: &[&str] = &["node_modules", ".git", "dist", ".next", ".turbo", "coverage", ".DS_Store"];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "encoding", rename_all = "lowercase")]
pub enum FileReadResult {
    #[serde(rename = "base64")]
    Base64 { content: String, mime_type: String, readonly: bool },
    #[serde(rename = "utf-8")]
    Utf8 { content: String, language: String, mime_type: String },
}

pub struct FileTree {
    root: PathBuf,
}

impl FileTree {
    /// `root` must already be an absolute, canonical path; every operation
    /// rejects anything that resolves outside it.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn confine(&self, path: &str) -> Result<PathBuf, AgentError> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() { requested.to_path_buf() } else { self.root.join(requested) };
        let resolved = dunce(&joined);

        if !resolved.starts_with(&self.root) {
            return Err(AgentError::user("Path traversal not allowed"));
        }
        Ok(resolved)
    }

    /// List `dir_path` up to `depth` levels deep. Ignored names are dropped;
    /// unreadable subdirectories are skipped rather than erroring.
    pub fn list(&self, dir_path: &str, depth: u32) -> Result<Vec<FileNode>, AgentError> {
        let resolved = self.confine(dir_path)?;
        Ok(list_dir(&resolved, &self.root, depth))
    }

    pub fn read(&self, path: &str) -> Result<FileReadResult, AgentError> {
        let resolved = self.confine(path)?;
        let ext = resolved.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            let bytes = std::fs::read(&resolved).map_err(|e| AgentError::resource(format!("read failed: {e}")))?;
            let content = base64::engine::general_purpose::STANDARD.encode(bytes);
            return Ok(FileReadResult::Base64 { content, mime_type: mime_for(&ext), readonly: true });
        }

        let content = std::fs::read_to_string(&resolved).map_err(|e| AgentError::resource(format!("read failed: {e}")))?;
        Ok(FileReadResult::Utf8 { content, language: language_for(&ext), mime_type: "text/plain".to_owned() })
    }

    pub fn write(&self, path: &str, content: &str) -> Result<usize, AgentError> {
        let resolved = self.confine(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgentError::resource(format!("mkdir failed: {e}")))?;
        }
        std::fs::write(&resolved, content).map_err(|e| AgentError::resource(format!("write failed: {e}")))?;
        Ok(content.len())
    }
}

/// Lexically resolve `..`/`.` components without requiring the path to
/// exist on disk (unlike `fs::canonicalize`, which needs real inodes and
/// would reject a path we're about to create with `write`).
fn dunce(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn list_dir(dir: &Path, root: &Path, depth: u32) -> Vec<FileNode> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut nodes: Vec<FileNode> = entries
        .filter_map(|e| e.ok())
        .filter(|e| !IGNORED.contains(&e.file_name().to_string_lossy().as_ref()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let path = e.path();
            let is_dir = e.file_type().ok()?.is_dir();
            let children = if is_dir && depth > 0 { list_dir(&path, root, depth - 1) } else { Vec::new() };
            let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
            Some(FileNode { name, path: rel, is_dir, children })
        })
        .collect();

    nodes.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    nodes
}

fn mime_for(ext: &str) -> String {
    let mime = match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    };
    mime.to_owned()
}

fn language_for(ext: &str) -> String {
    let language = match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "json" => "json",
        "md" => "markdown",
        "py" => "python",
        "go" => "go",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "html" | "htm" => "html",
        "css" => "css",
        "sh" | "bash" => "shellscript",
        _ => "plaintext",
    };
    language.to_owned()
}

#[cfg(test)]
#[path = "filetree_tests.rs"]
mod tests;

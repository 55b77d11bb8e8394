//! CLI surface and persisted configuration document.
//!
//! `Config` is the process-level knobs parsed by `clap`; [`PersistedConfig`]
//! is the on-disk document described in spec §6, loaded once at startup and
//! re-written whenever the project list changes.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// VibePilot's workstation agent.
#[derive(Debug, Parser)]
#[command(name = "vibepilot-agent", version, about)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "AGENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "AGENT_PORT", default_value = "9800")]
    pub port: u16,

    /// Ring buffer capacity per PTY session, in bytes.
    #[arg(long, env = "AGENT_RING_SIZE", default_value = "1048576")]
    pub ring_size: usize,

    /// Orphaned-session grace period, in seconds, before a detached shell is destroyed.
    #[arg(long, env = "AGENT_ORPHAN_TIMEOUT", default_value = "300")]
    pub orphan_timeout_secs: u64,

    /// Path to the persisted config document. Defaults to the platform config dir.
    #[arg(long, env = "AGENT_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Log format: "json" or "text".
    #[arg(long, env = "AGENT_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AGENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ring_size == 0 {
            anyhow::bail!("--ring-size must be greater than zero");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid --log-format: {other}"),
        }
        Ok(())
    }

    /// Resolve the persisted config document path, defaulting to the
    /// platform config directory when `--config-path` was not given.
    pub fn resolved_config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("vibepilot")
                .join("agent.json")
        })
    }
}

/// The agent-wide on-disk config document (spec §6 / §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedConfig {
    pub version: String,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum AuthConfig {
    None,
    Token { token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub session_timeout: u64,
    pub agent_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    pub project_id: String,
    pub name: String,
    pub root: PathBuf,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        let agent_name = hostname();
        Self {
            version: "0.1.0".to_owned(),
            auth: AuthConfig::None,
            server: ServerConfig { port: 9800, session_timeout: 300, agent_name },
            projects: Vec::new(),
        }
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "unknown".to_owned())
}

impl PersistedConfig {
    /// Load the document from `path`, falling back to defaults if the file
    /// is missing or fails to parse. Config loading never blocks startup.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "corrupt config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist the document to `path`, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

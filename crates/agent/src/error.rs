//! Unified error taxonomy shared across every core subsystem.
//!
//! Four kinds, per the design: [`AgentError::User`] and [`AgentError::Resource`]
//! are surfaced to the client as a typed `<domain>:error` message,
//! [`AgentError::Transient`] is logged and swallowed by the caller, and
//! [`AgentError::Fatal`] terminates the process after a best-effort
//! `destroy_all` sweep.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    User,
    Resource,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad path, disallowed shell, unknown session/tunnel/transfer. Never fatal.
    #[error("{0}")]
    User(String),

    /// Chrome not found, profile locked by a live pid, port unreachable. The
    /// owning session transitions to `error`.
    #[error("{0}")]
    Resource(String),

    /// CDP hiccup, transient I/O failure. Logged and swallowed by the caller.
    #[error("{0}")]
    Transient(String),

    /// Bus/transport corruption, panic in the router. Terminates the process.
    #[error("{0}")]
    Fatal(String),
}

impl AgentError {
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::User(_) => ErrorKind::User,
            Self::Resource(_) => ErrorKind::Resource,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Render as the message body of a `<domain>:error` wire frame.
    pub fn message(&self) -> String {
        match self {
            Self::User(m) | Self::Resource(m) | Self::Transient(m) | Self::Fatal(m) => m.clone(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

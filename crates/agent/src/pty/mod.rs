//! PTY Manager (C10): create/write/resize/destroy shells, enforce the
//! shell allow-list, and bind each session's [`OutputDelegate`] once at
//! creation so output survives client detach/reattach.

mod nbio;
mod spawn;

pub use spawn::{ExitStatus, NativePty};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
#[cfg(target_os = "macos")]
use tokio::process::Command;

use crate::error::AgentError;
use crate::output_delegate::OutputDelegate;

/// Shells `create` is willing to spawn. Anything else is rejected outright.
pub const ALLOWED_SHELLS: &[&str] = &[
    "/bin/bash",
    "/bin/zsh",
    "/bin/sh",
    "/usr/bin/bash",
    "/usr/bin/zsh",
    "/usr/local/bin/bash",
    "/usr/local/bin/zsh",
];

pub struct CreateOptions {
    pub cols: u16,
    pub rows: u16,
    pub cwd: Option<String>,
    pub shell: Option<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { cols: 80, rows: 24, cwd: None, shell: None }
    }
}

struct Session {
    pty: Arc<NativePty>,
    output: OutputDelegate,
    started_cwd: Option<String>,
    exited: Arc<AtomicBool>,
    exit_code: Arc<AtomicI32>,
}

/// Called once per session when its shell exits.
pub type ExitHandler = Arc<dyn Fn(&str, Option<i32>) + Send + Sync>;

pub struct PtyManager {
    sessions: Mutex<HashMap<String, Session>>,
    ring_capacity: usize,
    on_exit: ExitHandler,
}

impl PtyManager {
    pub fn new(ring_capacity: usize, on_exit: ExitHandler) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), ring_capacity, on_exit }
    }

    /// Spawn a shell for `session_id`, binding its output delegate once.
    /// Returns the child pid.
    pub fn create(&self, session_id: &str, opts: CreateOptions) -> Result<u32, AgentError> {
        let shell = opts.shell.unwrap_or_else(|| std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_owned()));
        if !ALLOWED_SHELLS.contains(&shell.as_str()) {
            return Err(AgentError::user("Shell not allowed"));
        }

        let pty = Arc::new(NativePty::spawn(&shell, opts.cols, opts.rows, opts.cwd.as_deref())?);
        let pid = pty.pid();
        let output = OutputDelegate::new(self.ring_capacity);
        let exited = Arc::new(AtomicBool::new(false));
        let exit_code = Arc::new(AtomicI32::new(i32::MIN));

        self.spawn_pump(session_id, pty.clone(), output.clone());
        self.spawn_waiter(session_id, pty.clone(), exited.clone(), exit_code.clone());

        self.sessions.lock().insert(
            session_id.to_owned(),
            Session { pty, output, started_cwd: opts.cwd, exited, exit_code },
        );

        Ok(pid)
    }

    fn spawn_pump(&self, session_id: &str, pty: Arc<NativePty>, output: OutputDelegate) {
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            if let Err(e) = pty.pump(|chunk| output.produce(chunk)).await {
                tracing::debug!(session_id, error = %e, "pty pump ended with error");
            }
        });
    }

    fn spawn_waiter(
        &self,
        session_id: &str,
        pty: Arc<NativePty>,
        exited: Arc<AtomicBool>,
        exit_code: Arc<AtomicI32>,
    ) {
        let session_id = session_id.to_owned();
        let on_exit = self.on_exit.clone();
        tokio::spawn(async move {
            let status = tokio::task::spawn_blocking(move || pty.wait_for_exit()).await;
            let code = match status {
                Ok(Ok(status)) => status.code,
                _ => None,
            };
            exit_code.store(code.unwrap_or(i32::MIN), Ordering::Release);
            exited.store(true, Ordering::Release);
            on_exit(&session_id, code);
        });
    }

    pub fn write(&self, session_id: &str, data: &[u8]) -> Result<(), AgentError> {
        let pty = {
            let sessions = self.sessions.lock();
            sessions.get(session_id).map(|s| s.pty.clone())
        };
        let pty = pty.ok_or_else(|| AgentError::user(format!("no such session: {session_id}")))?;
        // write() is async; callers run this on the executor, so spawn and
        // let the delegate's handler deal with backpressure independently.
        tokio::spawn(async move {
            let _ = pty.write(data).await;
        });
        Ok(())
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), AgentError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(session_id).ok_or_else(|| AgentError::user(format!("no such session: {session_id}")))?;
        session.pty.resize(cols, rows)
    }

    pub fn output_delegate(&self, session_id: &str) -> Option<OutputDelegate> {
        self.sessions.lock().get(session_id).map(|s| s.output.clone())
    }

    pub fn attach_output(&self, session_id: &str, sink: Arc<dyn crate::output_delegate::OutputSink>) -> Option<Vec<u8>> {
        self.output_delegate(session_id).map(|d| d.attach(sink))
    }

    pub fn detach_output(&self, session_id: &str) {
        if let Some(delegate) = self.output_delegate(session_id) {
            delegate.detach();
        }
    }

    /// Idempotent: absent session is a no-op.
    pub fn destroy(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
    }

    pub fn destroy_all(&self) {
        self.sessions.lock().clear();
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Every session id currently tracked, attached or not.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn is_exited(&self, session_id: &str) -> Option<bool> {
        self.sessions.lock().get(session_id).map(|s| s.exited.load(Ordering::Acquire))
    }

    pub fn get_pid(&self, session_id: &str) -> Option<u32> {
        self.sessions.lock().get(session_id).map(|s| s.pty.pid())
    }

    pub fn exit_code(&self, session_id: &str) -> Option<i32> {
        let sessions = self.sessions.lock();
        let session = sessions.get(session_id)?;
        if !session.exited.load(Ordering::Acquire) {
            return None;
        }
        match session.exit_code.load(Ordering::Acquire) {
            i32::MIN => None,
            code => Some(code),
        }
    }

    /// Best-effort current working directory of the session's shell.
    /// Never fails — any error collapses to `None`.
    pub async fn get_cwd(&self, session_id: &str) -> Option<String> {
        let pid = self.get_pid(session_id)?;
        platform_cwd(pid).await
    }

    /// The directory the shell was launched in, if one was given at `create`.
    pub fn started_cwd(&self, session_id: &str) -> Option<String> {
        self.sessions.lock().get(session_id).and_then(|s| s.started_cwd.clone())
    }
}

#[cfg(target_os = "macos")]
async fn platform_cwd(pid: u32) -> Option<String> {
    use std::process::Stdio;

    let output = Command::new("lsof")
        .args(["-a", "-p", &pid.to_string(), "-d", "cwd", "-Fn"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    text.lines().find(|l| l.starts_with('n')).map(|l| l[1..].trim().to_owned())
}

#[cfg(not(target_os = "macos"))]
async fn platform_cwd(pid: u32) -> Option<String> {
    let link = format!("/proc/{pid}/cwd");
    tokio::fs::read_link(link).await.ok().map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

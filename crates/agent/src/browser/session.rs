//! Browser Session (C9): orchestrates the Chrome detector, CDP client,
//! screencast stream, input handler, and cursor probe for one running
//! preview. At most one running session exists per agent.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

use super::cdp::{discover_new_page, CdpClient};
use super::cursor::CursorProbe;
use super::detector::ChromeDetector;
use super::input::{BrowserInputPayload, InputHandler};
use super::quality::AdaptiveQuality;
use super::screencast::{Frame, ScreencastOptions, ScreencastStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Error,
}

pub struct StartOptions {
    pub project_id: String,
    pub url: Option<String>,
    pub width: u32,
    pub height: u32,
    pub quality: Option<u8>,
}

/// Emitted upward so the bus can translate it into `browser:*` frames.
pub enum SessionEvent {
    Started { viewport_width: u32, viewport_height: u32 },
    Frame(Frame),
    Error(String),
}

pub type SessionEventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

struct RunningSession {
    chrome_pid: u32,
    cdp: CdpClient,
    screencast: Arc<ScreencastStream>,
    input: Mutex<InputHandler>,
    cursor: Mutex<CursorProbe>,
    quality: Mutex<AdaptiveQuality>,
    page_url: String,
    /// Cancels only the current screencast pump task, so a quality change
    /// can restart it without tearing down Chrome or the CDP connection.
    pump_cancel: Mutex<CancellationToken>,
}

pub struct BrowserSession {
    detector: ChromeDetector,
    remote_debugging_port: u16,
    state: Mutex<SessionState>,
    running: Mutex<Option<RunningSession>>,
}

impl BrowserSession {
    pub fn new(detector: ChromeDetector, remote_debugging_port: u16) -> Self {
        Self { detector, remote_debugging_port, state: Mutex::new(SessionState::Idle), running: Mutex::new(None) }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Resolve Chrome, reclaim its lock, launch with the project's profile,
    /// connect CDP, configure the viewport, and attach the screencast.
    pub async fn start(self: &Arc<Self>, opts: StartOptions, on_event: SessionEventSink) -> Result<(u32, u32), AgentError> {
        self.set_state(SessionState::Starting);

        match self.start_inner(opts, on_event.clone()).await {
            Ok(dims) => {
                self.set_state(SessionState::Running);
                Ok(dims)
            }
            Err(e) => {
                self.set_state(SessionState::Error);
                on_event(SessionEvent::Error(e.message()));
                Err(e)
            }
        }
    }

    async fn start_inner(self: &Arc<Self>, opts: StartOptions, on_event: SessionEventSink) -> Result<(u32, u32), AgentError> {
        let chrome_path =
            self.detector.detect().ok_or_else(|| AgentError::resource("no chrome executable found"))?;
        self.detector.clear_stale_lock(&opts.project_id)?;
        let profile_dir = self.detector.profile_path(&opts.project_id)?;

        let mut child = Command::new(&chrome_path)
            .arg(format!("--remote-debugging-port={}", self.remote_debugging_port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--headless=new")
            .arg(format!("--window-size={},{}", opts.width, opts.height))
            .spawn()
            .map_err(|e| AgentError::resource(format!("failed to launch chrome: {e}")))?;
        let chrome_pid = child.id().ok_or_else(|| AgentError::resource("chrome exited immediately"))?;
        // Don't block startup on the child; its exit code is irrelevant once
        // `stop` has already torn the session down via SIGTERM.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        // Give Chrome a moment to open its debugging port.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let url = opts.url.clone().unwrap_or_else(|| "about:blank".to_owned());
        let ws_url = discover_new_page(self.remote_debugging_port, &url).await?;
        let cdp = CdpClient::connect(&ws_url).await?;

        cdp.call(
            "Emulation.setDeviceMetricsOverride",
            json!({ "width": opts.width, "height": opts.height, "deviceScaleFactor": 1, "mobile": false }),
        )
        .await?;

        let screencast = Arc::new(ScreencastStream::new(cdp.clone()));
        let input = InputHandler::new(cdp.clone(), opts.width, opts.height);
        let cursor = CursorProbe::new(cdp.clone());
        let quality = AdaptiveQuality::new();
        let cancel = CancellationToken::new();

        self.spawn_screencast_pump(screencast.clone(), opts.quality, url.clone(), cancel.clone(), on_event.clone());

        *self.running.lock() = Some(RunningSession {
            chrome_pid,
            cdp,
            screencast,
            input: Mutex::new(input),
            cursor: Mutex::new(cursor),
            quality: Mutex::new(quality),
            page_url: url,
            pump_cancel: Mutex::new(cancel),
        });

        on_event(SessionEvent::Started { viewport_width: opts.width, viewport_height: opts.height });
        Ok((opts.width, opts.height))
    }

    fn spawn_screencast_pump(
        self: &Arc<Self>,
        screencast: Arc<ScreencastStream>,
        quality: Option<u8>,
        page_url: String,
        cancel: CancellationToken,
        on_event: SessionEventSink,
    ) {
        tokio::spawn(async move {
            let opts = ScreencastOptions { quality: quality.unwrap_or(70), ..Default::default() };
            let emit = on_event.clone();
            let result = tokio::select! {
                _ = cancel.cancelled() => Ok(()),
                r = screencast.start(opts, page_url, String::new(), move |frame| {
                    emit(SessionEvent::Frame(frame));
                }) => r,
            };
            if let Err(e) = result {
                on_event(SessionEvent::Error(e.message()));
            }
        });
    }

    /// Feed a client-reported `browser:frame-ack` latency into the adaptive
    /// quality controller. The value is clamped to a plausible range since
    /// the client computes it and nothing guarantees monotonicity.
    pub fn record_frame_ack(&self, latency_ms: f64) {
        let latency_ms = latency_ms.clamp(0.0, 60_000.0);
        let running = self.running.lock();
        let Some(session) = running.as_ref() else { return };
        session.quality.lock().sample(latency_ms);
    }

    pub fn current_quality(&self) -> Option<u8> {
        self.running.lock().as_ref().map(|s| s.quality.lock().quality())
    }

    /// Consumes the pending-restart flag, if the last quality sample
    /// crossed a threshold that warrants restarting the screencast.
    pub fn take_restart_request(&self) -> bool {
        self.running.lock().as_ref().is_some_and(|s| s.quality.lock().should_restart())
    }

    /// If the last `record_frame_ack` sample crossed a quality-change
    /// threshold, cancel the running screencast pump and start a fresh one
    /// at the new quality, reusing the same Chrome process and CDP
    /// connection. No-op if no session is running or no restart is due.
    pub fn restart_screencast_if_requested(self: &Arc<Self>, on_event: SessionEventSink) {
        if !self.take_restart_request() {
            return;
        }
        let Some((screencast, new_quality, page_url, old_cancel)) = ({
            let running = self.running.lock();
            running.as_ref().map(|s| {
                (s.screencast.clone(), s.quality.lock().quality(), s.page_url.clone(), s.pump_cancel.lock().clone())
            })
        }) else {
            return;
        };
        old_cancel.cancel();

        let new_cancel = CancellationToken::new();
        {
            let running = self.running.lock();
            if let Some(session) = running.as_ref() {
                *session.pump_cancel.lock() = new_cancel.clone();
            } else {
                return;
            }
        }
        self.spawn_screencast_pump(screencast, Some(new_quality), page_url, new_cancel, on_event);
    }

    pub async fn dispatch_input(&self, payload: &BrowserInputPayload) -> Result<(), AgentError> {
        if self.state() != SessionState::Running {
            return Err(AgentError::user("browser session is not running"));
        }
        let handler = {
            let running = self.running.lock();
            let session = running.as_ref().ok_or_else(|| AgentError::user("no running browser session"))?;
            session.input.lock().clone()
        };
        handler.dispatch(payload).await
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<(), AgentError> {
        let running = self.running.lock();
        let session = running.as_ref().ok_or_else(|| AgentError::user("no running browser session"))?;
        session.input.lock().resize(width, height);
        Ok(())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AgentError> {
        let cdp = {
            let running = self.running.lock();
            running.as_ref().ok_or_else(|| AgentError::user("no running browser session"))?.cdp.clone()
        };
        cdp.call("Page.navigate", json!({ "url": url })).await?;
        Ok(())
    }

    /// Evaluate the cursor at `(x, y)` and return it only if it changed
    /// since the last probe.
    pub async fn probe_cursor(&self, x: f64, y: f64) -> Option<String> {
        let cdp = {
            let running = self.running.lock();
            running.as_ref()?.cdp.clone()
        };
        // The probe itself is evaluated outside the session lock since CDP
        // round-trips are awaits; only its dedup state is swapped back in.
        let mut scratch = {
            let running = self.running.lock();
            let session = running.as_ref()?;
            std::mem::replace(&mut *session.cursor.lock(), CursorProbe::new(cdp))
        };
        let result = scratch.probe(x, y).await;

        let running = self.running.lock();
        if let Some(session) = running.as_ref() {
            *session.cursor.lock() = scratch;
        }
        result
    }

    /// Stop the screencast, close CDP, kill the browser, and go `idle`.
    pub async fn stop(&self) -> Result<(), AgentError> {
        let session = self.running.lock().take();
        if let Some(session) = session {
            session.pump_cancel.lock().cancel();
            let _ = session.screencast.stop().await;
            drop(session.cdp);
            kill_process(session.chrome_pid);
        }
        self.set_state(SessionState::Idle);
        Ok(())
    }
}

fn kill_process(pid: u32) {
    #[cfg(unix)]
    {
        let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGTERM);
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

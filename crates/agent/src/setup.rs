//! Wires every `Handler` the bus (C15) dispatches onto a concrete
//! subsystem in [`AppState`]. Kept as one module so the type → handler
//! mapping is visible in one place rather than scattered across the
//! subsystems themselves.

use std::sync::Arc;

use crate::bus::{Handler, Outbound, Router};
use crate::error::AgentError;
use crate::output_delegate::OutputSink;
use crate::pty::CreateOptions;
use crate::state::AppState;
use crate::wire::Frame;

/// Forwards produced PTY bytes out over the bus as `terminal:output`.
/// Binary-unsafe shell output is rendered lossily: the wire format carries
/// `String`, and a shell that emits invalid UTF-8 is rare enough that exact
/// byte fidelity isn't worth a second wire encoding.
struct BusOutputSink {
    session_id: String,
    outbound: Outbound,
}

impl OutputSink for BusOutputSink {
    fn send(&self, data: &[u8]) -> Result<(), String> {
        (self.outbound)(Frame::TerminalOutput {
            session_id: self.session_id.clone(),
            data: String::from_utf8_lossy(data).into_owned(),
        });
        Ok(())
    }
}

/// Register the handler for every inbound frame type against `state`.
/// Each registration is side-effect-free; the router doesn't dispatch
/// anything until a frame actually arrives on `/ws`.
pub fn register_handlers(router: &Router, state: &Arc<AppState>) {
    register_terminal(router, state);
    register_filetree(router, state);
    register_browser(router, state);
    register_tunnel(router, state);
    register_image(router, state);
    register_project(router, state);
}

fn handler<F>(f: F) -> Handler
where
    F: Fn(Frame, Outbound) -> crate::bus::BoxFuture<Result<(), AgentError>> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn register_terminal(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "terminal:create",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalCreate(payload) = frame else { return Ok(()) };
                let opts = CreateOptions {
                    cols: payload.cols.unwrap_or(80),
                    rows: payload.rows.unwrap_or(24),
                    cwd: payload.cwd,
                    shell: payload.shell,
                };
                let pid = state.pty.create(&payload.session_id, opts)?;
                let sink = Arc::new(BusOutputSink { session_id: payload.session_id.clone(), outbound: outbound.clone() });
                state.pty.attach_output(&payload.session_id, sink);
                outbound(Frame::TerminalCreated { session_id: payload.session_id, pid });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:input",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalInput { session_id, data } = frame else { return Ok(()) };
                state.pty.write(&session_id, data.as_bytes())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:resize",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalResize { session_id, cols, rows } = frame else { return Ok(()) };
                state.pty.resize(&session_id, cols, rows)
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:destroy",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalDestroy { session_id } = frame else { return Ok(()) };
                state.persistence.reclaim(&session_id);
                let exit_code = state.pty.exit_code(&session_id);
                state.pty.destroy(&session_id);
                outbound(Frame::TerminalDestroyed { session_id, exit_code });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:attach",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalAttach { session_id } = frame else { return Ok(()) };
                if !state.pty.has_session(&session_id) {
                    return Err(AgentError::user(format!("no such session: {session_id}")));
                }
                state.persistence.reclaim(&session_id);
                let sink = Arc::new(BusOutputSink { session_id: session_id.clone(), outbound: outbound.clone() });
                let buffered = state.pty.attach_output(&session_id, sink).unwrap_or_default();
                outbound(Frame::TerminalAttached { session_id, buffered: String::from_utf8_lossy(&buffered).into_owned() });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:list-sessions",
        handler(move |_frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let sessions = state
                    .pty
                    .session_ids()
                    .into_iter()
                    .map(|session_id| {
                        let cwd = state.pty.started_cwd(&session_id);
                        let exited = state.pty.is_exited(&session_id).unwrap_or(false);
                        crate::wire::TerminalSessionSummary { session_id, cwd, exited }
                    })
                    .collect();
                outbound(Frame::TerminalSessions { sessions });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "terminal:cwd",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TerminalCwd { session_id } = frame else { return Ok(()) };
                let cwd = state.pty.get_cwd(&session_id).await;
                outbound(Frame::TerminalCwdData { session_id, cwd });
                Ok(())
            })
        }),
    );
}

fn register_filetree(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "filetree:list",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::FiletreeList { path, depth } = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                let nodes = project.filetree.list(&path, depth)?;
                outbound(Frame::FiletreeData { nodes });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "file:read",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::FileRead { path } = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                let result = project.filetree.read(&path)?;
                outbound(Frame::FileData { path, result });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "file:write",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::FileWrite { path, content } = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                let size = project.filetree.write(&path, &content)?;
                outbound(Frame::FileWritten { size });
                Ok(())
            })
        }),
    );
}

fn register_browser(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "browser:start",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::BrowserStart { url, width, height, quality } = frame else { return Ok(()) };
                let project_id = state.current_project_id().ok_or_else(|| AgentError::user("no active project"))?;
                let project = state.project(&project_id).ok_or_else(|| AgentError::user("no active project"))?;
                let opts = crate::browser::session::StartOptions { project_id, url, width, height, quality };
                let session_event_outbound = outbound.clone();
                let on_event: crate::browser::session::SessionEventSink =
                    Arc::new(move |event| emit_session_event(&session_event_outbound, event));
                project.browser.start(opts, on_event).await?;
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "browser:input",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::BrowserInput(payload) = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                project.browser.dispatch_input(&payload).await
            })
        }),
    );

    let st = state.clone();
    router.register(
        "browser:frame-ack",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::BrowserFrameAck { timestamp } = frame else { return Ok(()) };
                if let Some(project) = state.current_project() {
                    project.browser.record_frame_ack(timestamp);
                    let session_event_outbound = outbound.clone();
                    let on_event: crate::browser::session::SessionEventSink =
                        Arc::new(move |event| emit_session_event(&session_event_outbound, event));
                    project.browser.restart_screencast_if_requested(on_event);
                }
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "browser:navigate",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::BrowserNavigate { url } = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                project.browser.navigate(&url).await?;
                outbound(Frame::BrowserNavigated { url, title: String::new() });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "browser:resize",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::BrowserResize { width, height } = frame else { return Ok(()) };
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                project.browser.resize(width, height)
            })
        }),
    );

    let st = state.clone();
    router.register(
        "browser:stop",
        handler(move |_frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let project = state.current_project().ok_or_else(|| AgentError::user("no active project"))?;
                project.browser.stop().await?;
                outbound(Frame::BrowserStopped {});
                Ok(())
            })
        }),
    );
}

/// Translate a [`SessionEvent`](crate::browser::session::SessionEvent) into
/// its wire frame and push it out. Kept outside the handler closures since
/// it's shared by every `browser:start` call.
fn emit_session_event(outbound: &Outbound, event: crate::browser::session::SessionEvent) {
    use crate::browser::session::SessionEvent;
    match event {
        SessionEvent::Started { viewport_width, viewport_height } => {
            outbound(Frame::BrowserStarted { viewport_width, viewport_height });
        }
        SessionEvent::Frame(frame) => {
            outbound(Frame::BrowserFrame { data: frame.data, metadata: frame.metadata });
        }
        SessionEvent::Error(error) => {
            outbound(Frame::BrowserError { error });
        }
    }
}

fn register_tunnel(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "tunnel:open",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TunnelOpen { tunnel_id, port, host } = frame else { return Ok(()) };
                match state.tunnel.open(&tunnel_id, port, host) {
                    Ok(()) => outbound(Frame::TunnelOpened { tunnel_id }),
                    Err(e) => outbound(Frame::TunnelError { tunnel_id, error: e.message() }),
                }
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "tunnel:request",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TunnelRequest { request_id, tunnel_id, method, path, headers, body } = frame else {
                    return Ok(());
                };
                match state.tunnel.forward(&tunnel_id, &request_id, &method, &path, headers, body).await {
                    Ok((request_id, response)) => {
                        outbound(Frame::TunnelResponse {
                            request_id,
                            status: response.status,
                            headers: response.headers,
                            body: response.body,
                        });
                    }
                    Err(e) => outbound(Frame::TunnelError { tunnel_id, error: e.message() }),
                }
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "tunnel:close",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::TunnelClose { tunnel_id } = frame else { return Ok(()) };
                state.tunnel.close(&tunnel_id);
                Ok(())
            })
        }),
    );
}

fn register_image(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "image:start",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ImageStart { transfer_id, filename, total_size } = frame else { return Ok(()) };
                state.images.start_transfer(&transfer_id, &filename, total_size);
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "image:chunk",
        handler(move |frame, _outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ImageChunk { transfer_id, chunk_index, data } = frame else { return Ok(()) };
                state.images.add_chunk(&transfer_id, chunk_index, &data)
            })
        }),
    );

    let st = state.clone();
    router.register(
        "image:complete",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ImageComplete { transfer_id } = frame else { return Ok(()) };
                let path = state.images.complete(&transfer_id)?;
                outbound(Frame::ImageSaved { path: path.display().to_string() });
                Ok(())
            })
        }),
    );
}

fn register_project(router: &Router, state: &Arc<AppState>) {
    let st = state.clone();
    router.register(
        "project:list",
        handler(move |_frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let projects = state.persisted_config.lock().projects.clone();
                outbound(Frame::ProjectListData { projects });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "project:switch",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ProjectSwitch { project_id } = frame else { return Ok(()) };
                let project = state
                    .switch_project(&project_id)
                    .ok_or_else(|| AgentError::user(format!("unknown project: {project_id}")))?;
                outbound(Frame::ProjectSwitched { project });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "project:add",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ProjectAdd { project_id, name, root } = frame else { return Ok(()) };
                let project = state.add_project(crate::config::ProjectConfig { project_id, name, root }).await?;
                outbound(Frame::ProjectAdded { project });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "project:remove",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ProjectRemove { project_id } = frame else { return Ok(()) };
                state.remove_project(&project_id).await?;
                outbound(Frame::ProjectRemoved { project_id });
                Ok(())
            })
        }),
    );

    let st = state.clone();
    router.register(
        "project:update",
        handler(move |frame, outbound| {
            let state = st.clone();
            Box::pin(async move {
                let Frame::ProjectUpdate { project_id, name, root } = frame else { return Ok(()) };
                let project = state.update_project(&project_id, name, root).await?;
                outbound(Frame::ProjectUpdated { project });
                Ok(())
            })
        }),
    );
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod tests;

//! Wire envelope and payload types for every message the bus (C15) routes.
//!
//! Frames are `{type, payload}` tagged unions. We model that directly with
//! serde's internally-tagged enum representation keyed on `type`, which
//! keeps the Rust type and the wire shape in lockstep instead of hand
//! re-deriving a string tag everywhere a frame is built.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single in/out frame on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all_fields = "camelCase")]
pub enum Frame {
    #[serde(rename = "terminal:create")]
    TerminalCreate(TerminalCreate),
    #[serde(rename = "terminal:created")]
    TerminalCreated { session_id: String, pid: u32 },
    #[serde(rename = "terminal:input")]
    TerminalInput { session_id: String, data: String },
    #[serde(rename = "terminal:output")]
    TerminalOutput { session_id: String, data: String },
    #[serde(rename = "terminal:resize")]
    TerminalResize { session_id: String, cols: u16, rows: u16 },
    #[serde(rename = "terminal:destroy")]
    TerminalDestroy { session_id: String },
    #[serde(rename = "terminal:destroyed")]
    TerminalDestroyed { session_id: String, exit_code: Option<i32> },
    #[serde(rename = "terminal:attach")]
    TerminalAttach { session_id: String },
    #[serde(rename = "terminal:attached")]
    TerminalAttached { session_id: String, buffered: String },
    #[serde(rename = "terminal:list-sessions")]
    TerminalListSessions {},
    #[serde(rename = "terminal:sessions")]
    TerminalSessions { sessions: Vec<TerminalSessionSummary> },
    #[serde(rename = "terminal:cwd")]
    TerminalCwd { session_id: String },
    #[serde(rename = "terminal:cwd-data")]
    TerminalCwdData { session_id: String, cwd: Option<String> },
    #[serde(rename = "terminal:error")]
    TerminalError { error: String },

    #[serde(rename = "filetree:list")]
    FiletreeList { path: String, depth: u32 },
    #[serde(rename = "filetree:data")]
    FiletreeData { nodes: Vec<crate::filetree::FileNode> },

    #[serde(rename = "file:read")]
    FileRead { path: String },
    #[serde(rename = "file:data")]
    FileData { path: String, result: crate::filetree::FileReadResult },
    #[serde(rename = "file:write")]
    FileWrite { path: String, content: String },
    #[serde(rename = "file:written")]
    FileWritten { size: usize },
    #[serde(rename = "file:error")]
    FileError { error: String },

    #[serde(rename = "browser:start")]
    BrowserStart { url: Option<String>, width: u32, height: u32, quality: Option<u8> },
    #[serde(rename = "browser:started")]
    BrowserStarted { viewport_width: u32, viewport_height: u32 },
    #[serde(rename = "browser:frame")]
    BrowserFrame { data: String, metadata: FrameMetadata },
    #[serde(rename = "browser:frame-ack")]
    BrowserFrameAck { timestamp: f64 },
    #[serde(rename = "browser:input")]
    BrowserInput(crate::browser::input::BrowserInputPayload),
    #[serde(rename = "browser:navigate")]
    BrowserNavigate { url: String },
    #[serde(rename = "browser:navigated")]
    BrowserNavigated { url: String, title: String },
    #[serde(rename = "browser:cursor")]
    BrowserCursor { cursor: String },
    #[serde(rename = "browser:resize")]
    BrowserResize { width: u32, height: u32 },
    #[serde(rename = "browser:stop")]
    BrowserStop {},
    #[serde(rename = "browser:stopped")]
    BrowserStopped {},
    #[serde(rename = "browser:error")]
    BrowserError { error: String },

    #[serde(rename = "tunnel:open")]
    TunnelOpen { tunnel_id: String, port: u16, host: Option<String> },
    #[serde(rename = "tunnel:opened")]
    TunnelOpened { tunnel_id: String },
    #[serde(rename = "tunnel:request")]
    TunnelRequest {
        request_id: String,
        tunnel_id: String,
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        body: Option<String>,
    },
    #[serde(rename = "tunnel:response")]
    TunnelResponse {
        request_id: String,
        status: u16,
        headers: Vec<(String, String)>,
        body: Option<String>,
    },
    #[serde(rename = "tunnel:close")]
    TunnelClose { tunnel_id: String },
    #[serde(rename = "tunnel:error")]
    TunnelError { tunnel_id: String, error: String },

    #[serde(rename = "image:start")]
    ImageStart { transfer_id: String, filename: String, total_size: u64 },
    #[serde(rename = "image:chunk")]
    ImageChunk { transfer_id: String, chunk_index: u32, data: String },
    #[serde(rename = "image:complete")]
    ImageComplete { transfer_id: String },
    #[serde(rename = "image:saved")]
    ImageSaved { path: String },

    #[serde(rename = "project:list")]
    ProjectList {},
    #[serde(rename = "project:list-data")]
    ProjectListData { projects: Vec<crate::config::ProjectConfig> },
    #[serde(rename = "project:switch")]
    ProjectSwitch { project_id: String },
    #[serde(rename = "project:switched")]
    ProjectSwitched { project: crate::config::ProjectConfig },
    #[serde(rename = "project:add")]
    ProjectAdd { project_id: String, name: String, root: PathBuf },
    #[serde(rename = "project:added")]
    ProjectAdded { project: crate::config::ProjectConfig },
    #[serde(rename = "project:remove")]
    ProjectRemove { project_id: String },
    #[serde(rename = "project:removed")]
    ProjectRemoved { project_id: String },
    #[serde(rename = "project:update")]
    ProjectUpdate { project_id: String, name: Option<String>, root: Option<PathBuf> },
    #[serde(rename = "project:updated")]
    ProjectUpdated { project: crate::config::ProjectConfig },
    #[serde(rename = "project:error")]
    ProjectError { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TerminalCreate {
    pub session_id: String,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub cwd: Option<String>,
    pub shell: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSessionSummary {
    pub session_id: String,
    pub cwd: Option<String>,
    pub exited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMetadata {
    pub page_url: String,
    pub page_title: String,
    pub timestamp: f64,
}

impl Frame {
    /// The `type` discriminant this frame would serialize under, without
    /// actually encoding the payload. Used by the router to pick a lane.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::TerminalCreate(_) => "terminal:create",
            Self::TerminalCreated { .. } => "terminal:created",
            Self::TerminalInput { .. } => "terminal:input",
            Self::TerminalOutput { .. } => "terminal:output",
            Self::TerminalResize { .. } => "terminal:resize",
            Self::TerminalDestroy { .. } => "terminal:destroy",
            Self::TerminalDestroyed { .. } => "terminal:destroyed",
            Self::TerminalAttach { .. } => "terminal:attach",
            Self::TerminalAttached { .. } => "terminal:attached",
            Self::TerminalListSessions {} => "terminal:list-sessions",
            Self::TerminalSessions { .. } => "terminal:sessions",
            Self::TerminalCwd { .. } => "terminal:cwd",
            Self::TerminalCwdData { .. } => "terminal:cwd-data",
            Self::TerminalError { .. } => "terminal:error",
            Self::FiletreeList { .. } => "filetree:list",
            Self::FiletreeData { .. } => "filetree:data",
            Self::FileRead { .. } => "file:read",
            Self::FileData { .. } => "file:data",
            Self::FileWrite { .. } => "file:write",
            Self::FileWritten { .. } => "file:written",
            Self::FileError { .. } => "file:error",
            Self::BrowserStart { .. } => "browser:start",
            Self::BrowserStarted { .. } => "browser:started",
            Self::BrowserFrame { .. } => "browser:frame",
            Self::BrowserFrameAck { .. } => "browser:frame-ack",
            Self::BrowserInput(_) => "browser:input",
            Self::BrowserNavigate { .. } => "browser:navigate",
            Self::BrowserNavigated { .. } => "browser:navigated",
            Self::BrowserCursor { .. } => "browser:cursor",
            Self::BrowserResize { .. } => "browser:resize",
            Self::BrowserStop {} => "browser:stop",
            Self::BrowserStopped {} => "browser:stopped",
            Self::BrowserError { .. } => "browser:error",
            Self::TunnelOpen { .. } => "tunnel:open",
            Self::TunnelOpened { .. } => "tunnel:opened",
            Self::TunnelRequest { .. } => "tunnel:request",
            Self::TunnelResponse { .. } => "tunnel:response",
            Self::TunnelClose { .. } => "tunnel:close",
            Self::TunnelError { .. } => "tunnel:error",
            Self::ImageStart { .. } => "image:start",
            Self::ImageChunk { .. } => "image:chunk",
            Self::ImageComplete { .. } => "image:complete",
            Self::ImageSaved { .. } => "image:saved",
            Self::ProjectList {} => "project:list",
            Self::ProjectListData { .. } => "project:list-data",
            Self::ProjectSwitch { .. } => "project:switch",
            Self::ProjectSwitched { .. } => "project:switched",
            Self::ProjectAdd { .. } => "project:add",
            Self::ProjectAdded { .. } => "project:added",
            Self::ProjectRemove { .. } => "project:remove",
            Self::ProjectRemoved { .. } => "project:removed",
            Self::ProjectUpdate { .. } => "project:update",
            Self::ProjectUpdated { .. } => "project:updated",
            Self::ProjectError { .. } => "project:error",
        }
    }
}

/// Returns the `type` discriminant a [`Frame`] would serialize under,
/// without allocating the full envelope. Used by the router for dispatch
/// and by error translation to stamp the matching `<domain>:error` type.
pub fn domain_of(type_tag: &str) -> &str {
    type_tag.split(':').next().unwrap_or(type_tag)
}

/// Build the `<domain>:error` frame type string for a given incoming type,
/// e.g. `"terminal:create"` -> `"terminal:error"`.
pub fn error_type_for(type_tag: &str) -> String {
    format!("{}:error", domain_of(type_tag))
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;

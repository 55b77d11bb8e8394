//! Shared application state passed to every bus handler and HTTP route via
//! axum's `State` extractor. Organized into focused sub-structs by concern,
//! mirroring the teacher's `Store` layout.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::browser::detector::ChromeDetector;
use crate::browser::session::BrowserSession;
use crate::bus::transport::TransportHub;
use crate::bus::Router;
use crate::config::{Config, PersistedConfig};
use crate::error::AgentError;
use crate::filetree::FileTree;
use crate::image::ImageReceiver;
use crate::persistence::PersistenceManager;
use crate::pty::PtyManager;
use crate::tunnel::TunnelProxy;

/// Everything a single project root needs: its own file tree confinement
/// and its own browser session (each project gets its own Chrome profile).
pub struct ProjectState {
    pub filetree: FileTree,
    pub browser: Arc<BrowserSession>,
}

/// Fixed remote-debugging port for the single browser session that can be
/// running at any given time. Projects never run Chrome concurrently, so
/// every `ProjectState` can safely share it.
const REMOTE_DEBUGGING_PORT: u16 = 9222;

pub struct AppState {
    pub pty: Arc<PtyManager>,
    pub persistence: Arc<PersistenceManager>,
    pub tunnel: Arc<TunnelProxy>,
    pub images: Arc<ImageReceiver>,
    pub projects: Mutex<std::collections::HashMap<String, Arc<ProjectState>>>,
    pub active_project: Mutex<Option<String>>,
    pub persisted_config: Mutex<PersistedConfig>,
    pub config_path: PathBuf,
    pub router: Arc<Router>,
    pub transport: Arc<TransportHub>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Assemble the process-wide state. `persisted` is the config document
    /// already loaded from disk (or defaulted); callers pass it in rather
    /// than loading here so startup failures surface before the bus wires
    /// handlers that expect it to exist.
    ///
    /// Fails only if the image staging directory can't be created; every
    /// other subsystem starts empty and develops failure modes at request
    /// time instead of at construction time.
    pub async fn new(config: &Config, persisted: PersistedConfig) -> Result<Arc<Self>, crate::error::AgentError> {
        let transport = Arc::new(TransportHub::new());
        let router = Arc::new(Router::new(transport.outbound()));

        // `PersistenceManager` needs the already-built `Arc<PtyManager>`, but
        // the PTY exit handler needs to reach `PersistenceManager` to drop a
        // shell's orphan record the moment it exits on its own (rather than
        // waiting on the slower timer-expiry path). Break the cycle with a
        // cell the exit handler reads from and that gets filled in right
        // after `PersistenceManager` exists.
        let persistence_cell: Arc<std::sync::OnceLock<Arc<PersistenceManager>>> =
            Arc::new(std::sync::OnceLock::new());

        let exit_outbound = transport.outbound();
        let exit_persistence = persistence_cell.clone();
        let on_exit: crate::pty::ExitHandler = Arc::new(move |session_id, exit_code| {
            exit_outbound(crate::wire::Frame::TerminalDestroyed {
                session_id: session_id.to_owned(),
                exit_code,
            });
            if let Some(persistence) = exit_persistence.get() {
                persistence.handle_orphaned_exit(session_id);
            }
        });
        let pty = Arc::new(PtyManager::new(config.ring_size, on_exit));

        let on_expire: crate::persistence::ExpireHandler = Arc::new(move |session_id| {
            tracing::info!(session_id, "orphaned session expired and was destroyed");
        });
        let persistence = Arc::new(PersistenceManager::new(
            pty.clone(),
            std::time::Duration::from_secs(config.orphan_timeout_secs),
            on_expire,
        ));
        let _ = persistence_cell.set(persistence.clone());
        let tunnel = Arc::new(TunnelProxy::new());
        let images = Arc::new(ImageReceiver::init()?);

        Ok(Arc::new(Self {
            pty,
            persistence,
            tunnel,
            images,
            projects: Mutex::new(std::collections::HashMap::new()),
            active_project: Mutex::new(None),
            persisted_config: Mutex::new(persisted),
            config_path: config.resolved_config_path(),
            router,
            transport,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Get or create the per-project state (file tree root + browser
    /// session) for `project_id`, looking up its configured root from the
    /// persisted project list.
    pub fn project(&self, project_id: &str) -> Option<Arc<ProjectState>> {
        if let Some(existing) = self.projects.lock().get(project_id) {
            return Some(existing.clone());
        }
        let root = self
            .persisted_config
            .lock()
            .projects
            .iter()
            .find(|p| p.project_id == project_id)
            .map(|p| p.root.clone())?;

        let profiles_base = root.join(".vibepilot").join("chrome-profiles");
        let state = Arc::new(ProjectState {
            filetree: FileTree::new(root),
            browser: Arc::new(BrowserSession::new(ChromeDetector::new(profiles_base), REMOTE_DEBUGGING_PORT)),
        });
        self.projects.lock().insert(project_id.to_owned(), state.clone());
        Some(state)
    }

    /// The id selected by the last `project:switch`, if any, defaulting to
    /// the sole configured project when exactly one exists.
    pub fn current_project_id(&self) -> Option<String> {
        self.active_project.lock().clone().or_else(|| {
            let projects = &self.persisted_config.lock().projects;
            match projects.as_slice() {
                [only] => Some(only.project_id.clone()),
                _ => None,
            }
        })
    }

    /// The project selected by the last `project:switch`, if any, defaulting
    /// to the sole configured project when exactly one exists.
    pub fn current_project(&self) -> Option<Arc<ProjectState>> {
        self.project(&self.current_project_id()?)
    }

    /// Record `project_id` as the active project and return its config
    /// entry, or `None` if it isn't in the persisted project list.
    pub fn switch_project(&self, project_id: &str) -> Option<crate::config::ProjectConfig> {
        let entry = self
            .persisted_config
            .lock()
            .projects
            .iter()
            .find(|p| p.project_id == project_id)
            .cloned()?;
        *self.active_project.lock() = Some(project_id.to_owned());
        Some(entry)
    }

    /// Add a new project to the persisted list and re-save the config
    /// document. Rejected if `project_id` is already taken.
    pub async fn add_project(
        &self,
        project: crate::config::ProjectConfig,
    ) -> Result<crate::config::ProjectConfig, AgentError> {
        {
            let mut persisted = self.persisted_config.lock();
            if persisted.projects.iter().any(|p| p.project_id == project.project_id) {
                return Err(AgentError::user(format!("project already exists: {}", project.project_id)));
            }
            persisted.projects.push(project.clone());
        }
        self.save_config().await?;
        Ok(project)
    }

    /// Remove a project from the persisted list, drop any memoized file
    /// tree/browser session for it, and clear it as the active project if
    /// it was selected. Re-saves the config document.
    pub async fn remove_project(&self, project_id: &str) -> Result<(), AgentError> {
        {
            let mut persisted = self.persisted_config.lock();
            let before = persisted.projects.len();
            persisted.projects.retain(|p| p.project_id != project_id);
            if persisted.projects.len() == before {
                return Err(AgentError::user(format!("unknown project: {project_id}")));
            }
        }
        self.projects.lock().remove(project_id);
        let mut active = self.active_project.lock();
        if active.as_deref() == Some(project_id) {
            *active = None;
        }
        drop(active);
        self.save_config().await?;
        Ok(())
    }

    /// Update a project's `name` and/or `root` in the persisted list and
    /// re-save the config document. Drops its memoized state so the next
    /// lookup picks up the new root.
    pub async fn update_project(
        &self,
        project_id: &str,
        name: Option<String>,
        root: Option<PathBuf>,
    ) -> Result<crate::config::ProjectConfig, AgentError> {
        let updated = {
            let mut persisted = self.persisted_config.lock();
            let entry = persisted
                .projects
                .iter_mut()
                .find(|p| p.project_id == project_id)
                .ok_or_else(|| AgentError::user(format!("unknown project: {project_id}")))?;
            if let Some(name) = name {
                entry.name = name;
            }
            if let Some(root) = root {
                entry.root = root;
            }
            entry.clone()
        };
        self.projects.lock().remove(project_id);
        self.save_config().await?;
        Ok(updated)
    }

    async fn save_config(&self) -> Result<(), AgentError> {
        let snapshot = self.persisted_config.lock().clone();
        snapshot
            .save(&self.config_path)
            .await
            .map_err(|e| AgentError::resource(format!("failed to save config: {e}")))
    }

    /// Called when the primary transport drops: every session still
    /// attached transitions to orphaned rather than being destroyed, so a
    /// reconnecting client can reclaim it before the timeout fires.
    pub fn orphan_all_attached(self: &Arc<Self>) {
        for session_id in self.pty.session_ids() {
            if let Some(delegate) = self.pty.output_delegate(&session_id) {
                if delegate.is_attached() {
                    delegate.detach();
                    let last_cwd = self.pty.started_cwd(&session_id);
                    self.persistence.orphan(&session_id, last_cwd);
                }
            }
        }
    }

    /// Tear down every live resource: PTY sessions, orphan timers, and any
    /// running browser sessions. Called on SIGINT/SIGTERM and once at
    /// startup to guard against a crashed-and-restarted process inheriting
    /// stale child processes (it never is, in practice, since PTYs don't
    /// survive the agent's own death, but `destroy_all` is idempotent).
    pub async fn destroy_all(&self) {
        self.persistence.destroy_all();
        self.pty.destroy_all();
        let projects: Vec<Arc<ProjectState>> = self.projects.lock().values().cloned().collect();
        for project in projects {
            let _ = project.browser.stop().await;
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

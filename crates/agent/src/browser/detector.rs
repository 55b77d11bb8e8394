//! Chrome Detector & Profile Manager (C4): locates a Chrome/Chromium
//! executable, manages per-project profile directories, and reclaims
//! stale `SingletonLock` files left behind by a crashed instance.

use std::path::{Path, PathBuf};

use nix::sys::signal;
use nix::unistd::Pid;

use crate::error::AgentError;

#[cfg(target_os = "macos")]
const CANDIDATE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
];

#[cfg(target_os = "windows")]
const CANDIDATE_PATHS: &[&str] = &[
    "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files\\Chromium\\Application\\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CANDIDATE_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

pub struct ChromeDetector {
    profiles_base: PathBuf,
}

impl ChromeDetector {
    pub fn new(profiles_base: PathBuf) -> Self {
        Self { profiles_base }
    }

    /// Walk the platform path table and return the first executable that
    /// exists, or `None`. On Windows, a per-user install under
    /// `%LOCALAPPDATA%` (Chrome's no-admin-rights default) is checked before
    /// the machine-wide `Program Files` locations.
    pub fn detect(&self) -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            if let Ok(local_app_data) = std::env::var("LOCALAPPDATA") {
                let per_user =
                    PathBuf::from(local_app_data).join("Google").join("Chrome").join("Application").join("chrome.exe");
                if per_user.is_file() {
                    return Some(per_user);
                }
            }
        }
        CANDIDATE_PATHS.iter().map(PathBuf::from).find(|p| p.is_file())
    }

    /// `mkdir -p <base>/<project_id>` and return the path.
    pub fn profile_path(&self, project_id: &str) -> Result<PathBuf, AgentError> {
        let path = self.profiles_base.join(project_id);
        std::fs::create_dir_all(&path).map_err(|e| AgentError::resource(format!("mkdir failed: {e}")))?;
        Ok(path)
    }

    /// Remove a stale `SingletonLock` (and its siblings) if the pid it
    /// points to is no longer alive. A missing lock is a no-op.
    pub fn clear_stale_lock(&self, project_id: &str) -> Result<(), AgentError> {
        let profile = self.profiles_base.join(project_id);
        let lock = profile.join("SingletonLock");

        let Ok(target) = std::fs::read_link(&lock) else {
            return Ok(());
        };

        let Some(pid) = lock_target_pid(&target) else {
            return Ok(());
        };

        if process_alive(pid) {
            return Ok(());
        }

        for name in ["SingletonLock", "SingletonSocket", "SingletonCookie"] {
            let _ = std::fs::remove_file(profile.join(name));
        }
        Ok(())
    }
}

/// `SingletonLock` is a symlink whose target ends in `hostname-<pid>`.
fn lock_target_pid(target: &Path) -> Option<u32> {
    let name = target.file_name()?.to_str()?;
    let pid_part = name.rsplit('-').next()?;
    pid_part.parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    signal::kill(Pid::from_raw(pid_i32), None).is_ok()
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;

//! `forkpty`-based native PTY, mirroring the controller/controlled pair a
//! real terminal emulator uses rather than a piped subprocess.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

use super::nbio::{read_chunk, set_nonblocking, write_all, PtyFd};
use crate::error::AgentError;

pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A spawned shell on a native PTY. Output is pumped by [`Self::pump`];
/// writes and resizes go through `&self` so the handle can be shared with
/// the PTY manager while the pump task owns the master fd.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
    cols: Arc<AtomicU16>,
    rows: Arc<AtomicU16>,
}

impl NativePty {
    /// Spawn `shell` on a fresh PTY sized `cols`x`rows`, starting in `cwd`
    /// if given. The child execs onto `shell` with `TERM=xterm-256color`
    /// set on top of the inherited environment; the caller is responsible
    /// for allow-list enforcement.
    #[allow(unsafe_code)]
    pub fn spawn(shell: &str, cols: u16, rows: u16, cwd: Option<&str>) -> Result<Self, AgentError> {
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty leaves the child partially initialized until the
        // immediate execvp below; no heap allocation happens in between
        // beyond what execvp and chdir themselves need.
        let ForkptyResult { master, fork_result } =
            unsafe { forkpty(&winsize, None) }.map_err(|e| AgentError::resource(format!("forkpty failed: {e}")))?;

        match fork_result {
            ForkResult::Child => {
                std::env::set_var("TERM", "xterm-256color");

                if let Some(cwd) = cwd {
                    if nix::unistd::chdir(cwd).is_err() {
                        std::process::exit(126);
                    }
                }

                // `shell` is always one of the `ALLOWED_SHELLS` literals, none of which contain a NUL byte.
                #[allow(clippy::expect_used)]
                let c_shell = CString::new(shell.as_bytes()).expect("shell path has no interior NUL");
                let _ = execvp(&c_shell, &[c_shell.clone()]);
                // execvp only returns on failure.
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master).map_err(|e| AgentError::resource(format!("set_nonblocking failed: {e}")))?;
                let afd = AsyncFd::new(PtyFd(master))
                    .map_err(|e| AgentError::resource(format!("AsyncFd::new failed: {e}")))?;
                Ok(Self {
                    master: afd,
                    child_pid: child,
                    cols: Arc::new(AtomicU16::new(cols)),
                    rows: Arc::new(AtomicU16::new(rows)),
                })
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.child_pid.as_raw() as u32
    }

    pub async fn write(&self, data: &[u8]) -> Result<(), AgentError> {
        write_all(&self.master, data).await.map_err(|e| AgentError::resource(format!("pty write failed: {e}")))
    }

    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), AgentError> {
        self.cols.store(cols, Ordering::Relaxed);
        self.rows.store(rows, Ordering::Relaxed);

        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };
        // SAFETY: TIOCSWINSZ is a well-defined ioctl and `ws` is fully
        // initialized for its expected layout.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            return Err(AgentError::resource(format!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error())));
        }
        Ok(())
    }

    /// Read output chunks until EOF/EIO, forwarding each to `on_output`.
    /// Returns once the child's side of the PTY has closed.
    pub async fn pump(&self, mut on_output: impl FnMut(&[u8])) -> Result<(), AgentError> {
        let mut buf = vec![0u8; 8192];
        loop {
            match read_chunk(&self.master, &mut buf).await {
                Ok(0) => return Ok(()),
                Ok(n) => on_output(&buf[..n]),
                Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(()),
                Err(e) => return Err(AgentError::resource(format!("pty read failed: {e}"))),
            }
        }
    }

    /// Block until the child exits. Run on a blocking thread by the caller.
    pub fn wait_for_exit(&self) -> Result<ExitStatus, AgentError> {
        wait_for_exit(self.child_pid)
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

fn wait_for_exit(pid: Pid) -> Result<ExitStatus, AgentError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitStatus { code: None, signal: Some(sig as i32) }),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(AgentError::resource(format!("waitpid failed: {e}"))),
        }
    }
}

//! Non-blocking I/O helpers over a raw PTY master fd.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use tokio::io::unix::AsyncFd;

/// Newtype wrapper around `OwnedFd` so it can be registered with `AsyncFd`.
#[derive(Debug)]
pub struct PtyFd(pub OwnedFd);

impl AsRawFd for PtyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

pub fn set_nonblocking(fd: &impl AsRawFd) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(io_err)?;
    let flags = OFlag::from_bits_truncate(flags);
    fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK)).map_err(io_err)?;
    Ok(())
}

pub async fn read_chunk(afd: &AsyncFd<PtyFd>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = afd.readable().await?;
        match guard.try_io(|inner| nix::unistd::read(inner.as_raw_fd(), buf).map_err(io_err)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

pub async fn write_all(afd: &AsyncFd<PtyFd>, data: &[u8]) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let mut guard = afd.writable().await?;
        match guard.try_io(|inner| nix::unistd::write(inner, &data[offset..]).map_err(io_err)) {
            Ok(Ok(n)) => offset += n,
            Ok(Err(e)) => return Err(e),
            Err(_would_block) => continue,
        }
    }
    Ok(())
}

fn io_err(e: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}

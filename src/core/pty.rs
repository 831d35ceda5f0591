//! Pseudoterminal allocation
//!
//! A safe wrapper around `openpty(3)` for creating master/slave
//! descriptor pairs sized through the terminal-size metadata. The
//! master side is switched to non-blocking mode so harness reads never
//! stall; both descriptors are owned and closed on drop.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pseudoterminal: {0}")]
    Open(#[source] io::Error),

    #[error("failed to set descriptor flags: {0}")]
    Fcntl(#[source] io::Error),

    #[error("failed to query terminal size: {0}")]
    Winsize(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// An open pseudoterminal pair.
///
/// Bytes written to the slave side appear on the master side and vice
/// versa, which is what lets a test driver capture rendered output and
/// inject synthetic input.
pub struct PtyPair {
    master: OwnedFd,
    slave: OwnedFd,
}

impl PtyPair {
    /// Allocate a new pair sized to `width` x `height` cells. The
    /// master descriptor is non-blocking. On any failure every
    /// descriptor opened by this call is closed before returning.
    pub fn open(width: u16, height: u16) -> Result<Self> {
        let ws = libc::winsize {
            ws_row: height,
            ws_col: width,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let mut master: libc::c_int = -1;
        let mut slave: libc::c_int = -1;
        let rc = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null(),
                &ws,
            )
        };
        if rc != 0 {
            return Err(PtyError::Open(io::Error::last_os_error()));
        }
        // From here the OwnedFds close both sides on every error path.
        let master = unsafe { OwnedFd::from_raw_fd(master) };
        let slave = unsafe { OwnedFd::from_raw_fd(slave) };

        set_nonblocking(master.as_raw_fd()).map_err(PtyError::Fcntl)?;

        debug!(width, height, "opened pty pair");
        Ok(Self { master, slave })
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn slave_fd(&self) -> RawFd {
        self.slave.as_raw_fd()
    }

    /// Consume the pair, handing ownership of both descriptors to the
    /// caller as `(master, slave)`.
    pub fn split(self) -> (OwnedFd, OwnedFd) {
        (self.master, self.slave)
    }
}

/// Query the cell dimensions recorded on a terminal descriptor.
pub fn window_size(fd: RawFd) -> Result<(u16, u16)> {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 {
        return Err(PtyError::Winsize(io::Error::last_os_error()));
    }
    Ok((ws.ws_col, ws.ws_row))
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

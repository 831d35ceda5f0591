//! PTY test harness
//!
//! Runs a terminal session against the slave side of a pseudoterminal
//! pair so a test driver can capture rendered output from the master
//! side and inject synthetic input through it, without a real terminal.
//!
//! The harness moves between two states: `Uninitialized` and `Active`.
//! Re-initializing while active tears the previous session down first
//! (logged, so the forced reset is observable) and never leaks
//! descriptors; every exit path out of `Active` closes both sides.

use std::fs::File;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::core::pty::PtyPair;
use crate::core::session::{Error, Result, Terminal};

struct ActiveSession {
    /// Master side, non-blocking; reads drain whatever the renderer
    /// wrote to the slave.
    master: File,
    terminal: Terminal,
}

/// A PTY-backed test harness owning one terminal session at a time.
pub struct PtyHarness {
    config: Config,
    active: Option<ActiveSession>,
}

impl PtyHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Allocate a pseudoterminal pair sized `width` x `height` and
    /// initialize a terminal session against its slave side.
    ///
    /// If a session is already active it is torn down first; the reset
    /// is logged at WARN level. On failure all descriptors opened by
    /// this call are closed and the harness stays uninitialized.
    pub fn init_pty(&mut self, width: u16, height: u16) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument(
                "pty dimensions must be positive".into(),
            ));
        }
        if self.active.is_some() {
            warn!("cleaning up previous pty session before re-init");
            self.cleanup();
        }

        let (master, slave) = PtyPair::open(width, height)?.split();
        let mut terminal = Terminal::with_config(self.config.clone());
        // On failure both descriptors close on drop: master here,
        // slave inside the renderer/session it was moved into.
        terminal.init_fd(slave)?;

        debug!(width, height, "pty harness session active");
        self.active = Some(ActiveSession {
            master: File::from(master),
            terminal,
        });
        Ok(())
    }

    /// The terminal session bound to the slave side.
    pub fn terminal(&mut self) -> Result<&mut Terminal> {
        self.active
            .as_mut()
            .map(|s| &mut s.terminal)
            .ok_or(Error::NotInitialized)
    }

    /// Drain everything the session has written to the terminal.
    ///
    /// Waits a short settle delay so a just-issued present finishes,
    /// then reads until the master side is exhausted or the internal
    /// buffer cap is reached. Returns an empty string when nothing was
    /// written; never blocks indefinitely.
    pub fn read_output(&mut self) -> Result<String> {
        let settle = Duration::from_millis(self.config.harness.settle_delay_ms);
        let cap = self.config.harness.read_buffer;
        let session = self.active.as_mut().ok_or(Error::NotInitialized)?;

        thread::sleep(settle);

        let mut out: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match session.master.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    if n < buf.len() || out.len() >= cap {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        out.truncate(cap);
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Feed synthetic input to the session, as if a user had typed it:
    /// bytes written to the master side arrive on the session's input.
    pub fn write_input(&mut self, bytes: &[u8]) -> Result<()> {
        let session = self.active.as_mut().ok_or(Error::NotInitialized)?;
        let mut rest = bytes;
        while !rest.is_empty() {
            match session.master.write(rest) {
                Ok(0) => return Err(Error::Io(io::ErrorKind::WriteZero.into())),
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        session.master.flush()?;
        Ok(())
    }

    /// Tear down the active session: shut the terminal down and close
    /// both descriptors. A no-op when already uninitialized.
    pub fn cleanup(&mut self) {
        if let Some(mut session) = self.active.take() {
            if let Err(e) = session.terminal.shutdown() {
                warn!("terminal shutdown during cleanup failed: {e}");
            }
            debug!("pty harness session cleaned up");
            // Dropping the session closes the master; the slave
            // descriptors closed with the terminal.
        }
    }
}

impl Default for PtyHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PtyHarness {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{key, Event, Mod};

    #[cfg(target_os = "linux")]
    fn open_fd_count() -> usize {
        std::fs::read_dir("/proc/self/fd").unwrap().count()
    }

    #[test]
    fn test_render_and_read_output() {
        let mut harness = PtyHarness::new();
        harness.init_pty(20, 5).unwrap();

        let terminal = harness.terminal().unwrap();
        terminal.print(0, 0, "hi").unwrap();
        terminal.present().unwrap();

        let output = harness.read_output().unwrap();
        // Cursor homed to row 1, column 1, then the literal text.
        assert!(output.contains("\x1b[1;1H"), "missing home: {output:?}");
        assert!(output.contains("hi"), "missing text: {output:?}");

        harness.cleanup();
    }

    #[test]
    fn test_read_output_empty_when_idle() {
        let mut harness = PtyHarness::new();
        harness.init_pty(10, 2).unwrap();

        // Drain the init sequences, then read again with nothing new.
        harness.read_output().unwrap();
        let output = harness.read_output().unwrap();
        assert_eq!(output, "");
    }

    #[test]
    fn test_dimensions_round_trip() {
        let mut harness = PtyHarness::new();
        harness.init_pty(80, 24).unwrap();

        let terminal = harness.terminal().unwrap();
        assert_eq!(terminal.width().unwrap(), 80);
        assert_eq!(terminal.height().unwrap(), 24);
    }

    #[test]
    fn test_resize_event_updates_dimensions() {
        let mut harness = PtyHarness::new();
        harness.init_pty(80, 24).unwrap();

        // In-band resize report: CSI 48 ; height ; width ; ... t
        harness.write_input(b"\x1b[48;30;100;0;0t").unwrap();
        let terminal = harness.terminal().unwrap();
        let event = terminal.poll_event().unwrap();
        assert_eq!(event, Event::Resize { w: 100, h: 30 });
        assert_eq!(terminal.width().unwrap(), 100);
        assert_eq!(terminal.height().unwrap(), 30);
    }

    #[test]
    fn test_mouse_event_through_pty() {
        let mut harness = PtyHarness::new();
        harness.init_pty(40, 10).unwrap();

        // SGR left press at column 11, row 5 (1-based on the wire).
        harness.write_input(b"\x1b[<0;11;5M").unwrap();
        let event = harness.terminal().unwrap().poll_event().unwrap();
        assert_eq!(
            event,
            Event::Mouse {
                mods: Mod::empty(),
                key: key::MOUSE_LEFT,
                x: 10,
                y: 4,
            }
        );
    }

    #[test]
    fn test_key_event_through_pty() {
        let mut harness = PtyHarness::new();
        harness.init_pty(40, 10).unwrap();

        harness.write_input(b"q").unwrap();
        let event = harness.terminal().unwrap().poll_event().unwrap();
        assert_eq!(
            event,
            Event::Key {
                mods: Mod::empty(),
                key: 0,
                ch: Some('q'),
            }
        );
    }

    #[test]
    fn test_clear_removes_previous_content() {
        let mut harness = PtyHarness::new();
        harness.init_pty(20, 5).unwrap();

        let terminal = harness.terminal().unwrap();
        terminal.print(0, 0, "@").unwrap();
        terminal.present().unwrap();
        harness.read_output().unwrap();

        let terminal = harness.terminal().unwrap();
        terminal.clear().unwrap();
        terminal.present().unwrap();

        let output = harness.read_output().unwrap();
        assert!(!output.contains('@'));
    }

    #[test]
    fn test_cursor_sequences_through_pty() {
        let mut harness = PtyHarness::new();
        harness.init_pty(20, 5).unwrap();
        harness.read_output().unwrap();

        let terminal = harness.terminal().unwrap();
        terminal.set_cursor(5, 5).unwrap();
        terminal.present().unwrap();
        let output = harness.read_output().unwrap();
        assert!(output.contains("\x1b[6;6H"), "missing move: {output:?}");
        assert!(output.contains("\x1b[?25h"), "missing show: {output:?}");

        let terminal = harness.terminal().unwrap();
        terminal.hide_cursor().unwrap();
        terminal.present().unwrap();
        let output = harness.read_output().unwrap();
        assert!(output.contains("\x1b[?25l"), "missing hide: {output:?}");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut harness = PtyHarness::new();
        harness.init_pty(10, 2).unwrap();

        harness.cleanup();
        assert!(!harness.is_active());
        harness.cleanup();
        assert!(!harness.is_active());
        assert!(matches!(
            harness.read_output(),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_operations_before_init() {
        let mut harness = PtyHarness::new();
        assert!(matches!(harness.read_output(), Err(Error::NotInitialized)));
        assert!(matches!(
            harness.write_input(b"x"),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(harness.terminal(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut harness = PtyHarness::new();
        assert!(matches!(
            harness.init_pty(0, 5),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            harness.init_pty(5, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(!harness.is_active());
    }

    #[test]
    fn test_forced_reset_replaces_session() {
        let mut harness = PtyHarness::new();
        harness.init_pty(80, 24).unwrap();

        #[cfg(target_os = "linux")]
        let fds_before = open_fd_count();

        // Re-init while active: the old session is torn down first.
        harness.init_pty(40, 10).unwrap();
        assert!(harness.is_active());
        assert_eq!(harness.terminal().unwrap().width().unwrap(), 40);

        // The old pair was closed, so the open-descriptor count did
        // not grow.
        #[cfg(target_os = "linux")]
        assert_eq!(open_fd_count(), fds_before);

        harness.cleanup();
    }
}

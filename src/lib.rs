//! termgrid: a cell-grid terminal renderer and input decoder with a
//! PTY-backed test harness.
//!
//! The crate exposes a termbox-style surface around an explicit
//! session handle: a [`Terminal`] owns a cell [`Grid`], a diffing
//! renderer bound to a terminal descriptor, and an input decoder that
//! turns raw bytes into typed [`Event`]s. The [`PtyHarness`] runs a
//! session against the slave side of a pseudoterminal so tests can
//! assert on the exact control sequences a present emits, and inject
//! synthetic key and mouse input, without a real terminal.
//!
//! ```no_run
//! use termgrid::{PtyHarness, Result};
//!
//! fn main() -> Result<()> {
//!     let mut harness = PtyHarness::new();
//!     harness.init_pty(80, 24)?;
//!
//!     let terminal = harness.terminal()?;
//!     terminal.print(0, 0, "hello")?;
//!     terminal.present()?;
//!
//!     let output = harness.read_output()?;
//!     assert!(output.contains("hello"));
//!     harness.cleanup();
//!     Ok(())
//! }
//! ```
//!
//! Unix only: the harness and session descriptors are built on
//! `openpty(3)` and termios.

pub mod config;
pub mod core;
pub mod event;
pub mod harness;
pub mod ui;

pub use crate::config::Config;
pub use crate::core::session::{Error, Result, Terminal};
pub use crate::core::term::grid::{Attr, Cell, Grid};
pub use crate::event::{key, Event, Mod, RawEvent};
pub use crate::harness::PtyHarness;
pub use crate::ui::renderer::Renderer;

//! Core terminal components.
//!
//! This module contains the terminal-side logic:
//!
//! - **pty**: Unix pseudoterminal pair allocation
//! - **term**: cell grid and raw input-sequence decoding
//! - **session**: high-level session combining grid + renderer + input
//!
//! # Architecture
//!
//! ```text
//! Terminal (session handle)
//! ├── Grid (cell buffer: character + attributes)
//! ├── Renderer (diffs the grid onto the output descriptor)
//! └── InputParser (raw bytes -> RawEvent -> Event)
//! ```

pub mod pty;
pub mod session;
pub mod term;

//! Output rendering.
//!
//! - **renderer**: diff renderer flushing grid state to a terminal
//!   output stream

pub mod renderer;

pub use renderer::Renderer;

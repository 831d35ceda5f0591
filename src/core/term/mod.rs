//! Terminal state and input decoding.

pub mod grid;
pub mod input;

pub use grid::{Attr, Cell, Grid};
pub use input::InputParser;

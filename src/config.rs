//! Configuration
//!
//! TOML-backed settings for the terminal session and the PTY test
//! harness. Every field has a default, so an absent or partial file is
//! never an error.
//!
//! ```toml
//! [input]
//! mouse = true
//! esc_timeout_ms = 50
//!
//! [harness]
//! settle_delay_ms = 10
//! read_buffer = 8192
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input decoding settings
    pub input: InputConfig,
    /// Test harness settings
    pub harness: HarnessConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            harness: HarnessConfig::default(),
        }
    }
}

/// Input decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Enable mouse reporting (click/drag tracking + SGR extended mode)
    /// when a session initializes.
    pub mouse: bool,
    /// How long `poll_event` waits for the rest of an escape sequence
    /// before reporting a lone ESC key press, in milliseconds.
    pub esc_timeout_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mouse: true,
            esc_timeout_ms: 50,
        }
    }
}

/// Test harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Settle delay before `read_output` starts draining, giving a
    /// just-issued present time to finish writing, in milliseconds.
    pub settle_delay_ms: u64,
    /// Upper bound on bytes returned by a single `read_output` call.
    pub read_buffer: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 10,
            read_buffer: 8192,
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when
    /// the file is missing or malformed.
    pub fn load(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("ignoring invalid config {}: {e}", path.display()),
            }
        }
        Self::default()
    }
}

//! `[build]` section configuration.
//!
//! The external asset build run after every coalesced change burst
//! (and once by `kittens build`).
//!
//! # Example
//!
//! ```toml
//! [build]
//! enable = true
//! command = ["./tailwindcss", "-i", "./web/styles.css", "-o", "./web/static/css/styles.css"]
//! quiet = true
//! ```
//!
//! `$KITTENS_ROOT` inside arguments is replaced with the project root.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// External asset build command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Whether the build runs at all. Notifications are sent either way.
    pub enable: bool,

    /// Command and arguments to execute.
    pub command: Vec<String>,

    /// Suppress the command's stdout.
    pub quiet: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enable: true,
            command: vec![
                "./tailwindcss".into(),
                "-i".into(),
                "./web/styles.css".into(),
                "-o".into(),
                "./web/static/css/styles.css".into(),
            ],
            quiet: true,
        }
    }
}

impl BuildConfig {
    pub const COMMAND: FieldPath = FieldPath::new("build.command");

    /// Display name for logging (`command[0]`).
    pub fn display_name(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("build")
    }

    /// A build is only attempted when enabled and a program is given.
    pub fn is_active(&self) -> bool {
        self.enable && !self.command.is_empty()
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.enable && self.command.is_empty() {
            diag.error_with_hint(
                Self::COMMAND,
                "build is enabled but no command is set",
                "set `enable = false` to only notify browsers",
            );
        }
    }
}

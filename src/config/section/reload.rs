//! `[reload]` section configuration.
//!
//! Controls the watch → debounce → rebuild → broadcast loop.
//!
//! # Example
//!
//! ```toml
//! [reload]
//! port = 8081                             # WebSocket endpoint port (`/ws`)
//! watch = ["web", "src"]                  # Roots walked recursively
//! extensions = [".css", ".tmpl", ".rs"]   # Qualifying file extensions
//! ignore = ["web/dist"]                   # Build output; [serve] root is always added
//! debounce_ms = 150                       # Coalescing window
//! queue_capacity = 100                    # Undelivered notification bound
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Live-reload loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Port of the WebSocket upgrade endpoint.
    pub port: u16,

    /// Directories to watch (relative to project root).
    pub watch: Vec<PathBuf>,

    /// File extensions that qualify for a rebuild, with leading dot.
    pub extensions: Vec<String>,

    /// Paths whose changes never trigger a rebuild (relative to project
    /// root). The served directory is appended when the config is loaded.
    pub ignore: Vec<PathBuf>,

    /// Debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Capacity of the notification queue.
    pub queue_capacity: usize,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            watch: vec![PathBuf::from("web"), PathBuf::from("src")],
            extensions: vec![".css".into(), ".tmpl".into(), ".rs".into()],
            ignore: Vec::new(),
            debounce_ms: 150,
            queue_capacity: 100,
        }
    }
}

impl ReloadConfig {
    pub const PORT: FieldPath = FieldPath::new("reload.port");
    pub const WATCH: FieldPath = FieldPath::new("reload.watch");
    pub const EXTENSIONS: FieldPath = FieldPath::new("reload.extensions");
    pub const IGNORE: FieldPath = FieldPath::new("reload.ignore");
    pub const DEBOUNCE_MS: FieldPath = FieldPath::new("reload.debounce_ms");
    pub const QUEUE_CAPACITY: FieldPath = FieldPath::new("reload.queue_capacity");

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Normalize extensions to the `.ext` form used on the wire.
    pub fn normalize_extensions(&mut self) {
        for ext in &mut self.extensions {
            let trimmed = ext.trim();
            *ext = if trimmed.starts_with('.') {
                trimmed.to_string()
            } else {
                format!(".{trimmed}")
            };
        }
        self.extensions.dedup();
    }

    pub fn validate(&self, serve_port: u16, diag: &mut ConfigDiagnostics) {
        if self.port == 0 {
            diag.error(Self::PORT, "port must be non-zero");
        } else if self.port == serve_port {
            diag.error_with_hint(
                Self::PORT,
                format!("port {} is already used by [serve]", self.port),
                "pick a different port for the reload endpoint",
            );
        }
        if self.watch.is_empty() {
            diag.error(Self::WATCH, "at least one directory must be watched");
        }
        for root in &self.watch {
            if let Some(ignored) = self.ignore.iter().find(|i| root.starts_with(i)) {
                diag.error_with_hint(
                    Self::IGNORE,
                    format!("{} covers the watched root {}", ignored.display(), root.display()),
                    "ignore a subdirectory of the watched root instead",
                );
            }
        }
        if self.extensions.is_empty() {
            diag.error(Self::EXTENSIONS, "no extension would ever trigger a rebuild");
        }
        if self.debounce_ms == 0 {
            diag.error(Self::DEBOUNCE_MS, "debounce window must be at least 1ms");
        }
        if self.queue_capacity == 0 {
            diag.error(Self::QUEUE_CAPACITY, "queue capacity must be at least 1");
        }
    }
}

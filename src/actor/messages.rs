//! Actor Message Definitions
//!
//! Message types for inter-actor communication.
//!
//! ```text
//! FsActor --WatchEvent--> BuildActor --JSON--> NotificationQueue --> WsActor
//! ```

use std::path::{Path, PathBuf};

// =============================================================================
// Watch events
// =============================================================================

/// What happened to a watched path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    Write,
    Create,
    Remove,
    Rename,
}

impl WatchOp {
    pub fn label(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Rename => "rename",
        }
    }
}

/// A single observation from the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub op: WatchOp,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, op: WatchOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Extension including the leading dot (`.css`), or empty.
    pub fn ext(&self) -> String {
        dotted_ext(&self.path)
    }

    /// Browsers swap stylesheets in place for these; anything else means a
    /// full page reload.
    pub fn is_stylesheet(&self) -> bool {
        self.ext() == ".css"
    }

    /// Fold a later event into this one: a full reload is never downgraded
    /// to a stylesheet refresh, otherwise the later event wins.
    pub fn merge(self, later: WatchEvent) -> WatchEvent {
        if !self.is_stylesheet() && later.is_stylesheet() {
            self
        } else {
            later
        }
    }
}

/// `.ext` form of a path's extension, empty when there is none.
pub fn dotted_ext(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_ext() {
        assert_eq!(dotted_ext(Path::new("web/styles.css")), ".css");
        assert_eq!(dotted_ext(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(dotted_ext(Path::new("Makefile")), "");
    }

    #[test]
    fn test_merge_keeps_full_reload() {
        let css = WatchEvent::new("web/a.css", WatchOp::Write);
        let tmpl = WatchEvent::new("web/index.tmpl", WatchOp::Write);
        let other_css = WatchEvent::new("web/b.css", WatchOp::Write);

        assert_eq!(tmpl.clone().merge(css.clone()), tmpl);
        assert_eq!(css.clone().merge(tmpl.clone()), tmpl);
        assert_eq!(css.merge(other_css.clone()), other_css);
    }
}

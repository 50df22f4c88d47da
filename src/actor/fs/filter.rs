use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::actor::messages::{WatchEvent, WatchOp};

/// Decides whether an event may arm the debouncer.
///
/// Only content writes to files with an allow-listed extension qualify.
/// Creates, removes and renames never do; new directories are handled by
/// the watch-root layer instead. Anything under an ignored path (build
/// output) never qualifies, whatever its extension.
#[derive(Debug, Clone)]
pub struct EventFilter {
    extensions: FxHashSet<String>,
    ignored: Vec<PathBuf>,
}

impl EventFilter {
    /// `extensions` are expected in `.ext` form; see `ReloadConfig::normalize_extensions`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            ignored: Vec::new(),
        }
    }

    /// Never qualify events under any of `paths`.
    pub fn with_ignored(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignored.extend(paths);
        self
    }

    pub fn qualifies(&self, event: &WatchEvent) -> bool {
        event.op == WatchOp::Write
            && self.extensions.contains(&event.ext())
            && !self.ignored.iter().any(|dir| event.path.starts_with(dir))
    }
}

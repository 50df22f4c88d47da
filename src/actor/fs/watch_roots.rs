use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

/// Watch-root consistency manager.
///
/// Every directory below a root is registered non-recursively, so new
/// directories must be added as they appear.
///
/// Responsibility:
/// - Attach existing roots (and their subdirectories) at startup
/// - Register directories created while running
/// - Forget directories that were removed, so recreating them registers again
/// - Re-attach roots that were missing or removed and recreated
pub(super) struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    /// Walk every existing root and register its directories.
    ///
    /// A root that cannot be subscribed is fatal; a missing root is logged
    /// and picked up later by `maintain`.
    pub(super) fn attach_existing<W: Watcher>(&mut self, watcher: &mut W) -> notify::Result<()> {
        for root in self.desired.clone() {
            if !root.is_dir() {
                crate::log!("watch"; "{} does not exist yet, will watch once created", root.display());
                continue;
            }
            watcher.watch(&root, RecursiveMode::NonRecursive)?;
            self.attached.insert(root.clone());
            self.attach_subdirs(watcher, &root);
        }

        Ok(())
    }

    /// Register a directory that appeared under a watched root.
    ///
    /// Always re-registers: a directory with the same path may be a new one.
    pub(super) fn on_created<W: Watcher>(&mut self, watcher: &mut W, path: &Path) {
        if path.is_dir() {
            self.attach_dir(watcher, path);
            // Directories created in one go (`mkdir -p`) produce a single event.
            self.attach_subdirs(watcher, path);
        }
    }

    /// Forget a removed (or renamed-away) path and everything below it.
    pub(super) fn on_removed<W: Watcher>(&mut self, watcher: &mut W, path: &Path) {
        let gone: Vec<PathBuf> = self
            .attached
            .iter()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();

        for dir in gone {
            // Usually already dropped by the OS along with the directory.
            let _ = watcher.unwatch(&dir);
            self.attached.remove(&dir);
            crate::debug!("watch"; "stopped watching {}", dir.display());
        }
    }

    pub(super) fn maintain<W: Watcher>(&mut self, watcher: &mut W) {
        // Drop stale handles for directories that no longer exist.
        self.attached.retain(|path| path.exists());

        for root in self.desired.clone() {
            if self.attached.contains(&root) || !root.is_dir() {
                continue;
            }
            if watcher.watch(&root, RecursiveMode::NonRecursive).is_ok() {
                self.attached.insert(root.clone());
                self.attach_subdirs(watcher, &root);
                crate::debug!("watch"; "re-attached watch: {}", root.display());
            }
        }
    }

    pub(super) fn attached_count(&self) -> usize {
        self.attached.len()
    }

    fn attach_subdirs<W: Watcher>(&mut self, watcher: &mut W, root: &Path) {
        let dirs: Vec<PathBuf> = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.path())
            .collect();

        for dir in dirs {
            self.attach_dir(watcher, &dir);
        }
    }

    fn attach_dir<W: Watcher>(&mut self, watcher: &mut W, dir: &Path) {
        match watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                crate::debug!("watch"; "watching {}", dir.display());
                self.attached.insert(dir.to_path_buf());
            }
            Err(e) => crate::log!("watch"; "error watching {}: {}", dir.display(), e),
        }
    }
}

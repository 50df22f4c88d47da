use std::path::Path;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use crate::actor::messages::{WatchEvent, WatchOp};

/// Map a raw notify event to the operation it represents.
///
/// Metadata-only changes (mtime/atime/chmod noise) and access events map to
/// `None`; they would otherwise trigger endless rebuild loops when the build
/// touches the files it reads.
pub(super) fn watch_op(kind: &EventKind) -> Option<WatchOp> {
    match kind {
        EventKind::Create(_) => Some(WatchOp::Create),
        EventKind::Remove(_) => Some(WatchOp::Remove),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchOp::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchOp::Rename),
        EventKind::Modify(_) => Some(WatchOp::Write),
        _ => None,
    }
}

/// Flatten a notify event into one `WatchEvent` per non-temp path.
pub(super) fn to_watch_events(event: &notify::Event) -> Vec<WatchEvent> {
    let Some(op) = watch_op(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter(|path| !is_temp_file(path))
        .map(|path| WatchEvent::new(path.clone(), op))
        .collect()
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, EventHandler, RecursiveMode, Watcher, WatcherKind};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::debouncer::{Debouncer, Pending};
use super::types::{is_temp_file, to_watch_events, watch_op};
use super::watch_roots::WatchRoots;
use super::{Detector, EventFilter, MAINTAIN_INTERVAL};
use crate::actor::messages::{WatchEvent, WatchOp};

const WINDOW: Duration = Duration::from_millis(150);

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_dir_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::Folder)
}

fn create_dir_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::Folder)
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn write(path: &str) -> WatchEvent {
    WatchEvent::new(path, WatchOp::Write)
}

/// Watcher that only records what it was asked to watch.
///
/// The log is shared so it can be inspected after the watcher moved into a
/// running detector.
#[derive(Default)]
struct RecordingWatcher {
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingWatcher {
    fn log(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.watched)
    }

    fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().clone()
    }
}

impl Watcher for RecordingWatcher {
    fn new<F: EventHandler>(_event_handler: F, _config: Config) -> notify::Result<Self> {
        Ok(Self::default())
    }

    fn watch(&mut self, path: &std::path::Path, _mode: RecursiveMode) -> notify::Result<()> {
        self.watched.lock().push(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, _path: &std::path::Path) -> notify::Result<()> {
        Ok(())
    }

    fn kind() -> WatcherKind {
        WatcherKind::NullWatcher
    }
}

type DetectorParts = (
    mpsc::Sender<notify::Event>,
    mpsc::Receiver<WatchEvent>,
    CancellationToken,
    tokio::task::JoinHandle<()>,
);

/// Spawn a detector fed by the returned sender.
fn spawn_detector(trigger_capacity: usize) -> DetectorParts {
    spawn_detector_with(
        trigger_capacity,
        RecordingWatcher::default(),
        WatchRoots::new(Vec::new()),
    )
}

fn spawn_detector_with(
    trigger_capacity: usize,
    watcher: RecordingWatcher,
    watch_roots: WatchRoots,
) -> DetectorParts {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (trigger_tx, trigger_rx) = mpsc::channel(trigger_capacity);
    let token = CancellationToken::new();

    let detector = Detector::new(
        watcher,
        watch_roots,
        EventFilter::new([".css", ".tmpl", ".rs"]),
        WINDOW,
        trigger_tx,
    );
    let handle = tokio::spawn(detector.run(event_rx, token.clone()));

    (event_tx, trigger_rx, token, handle)
}

// =============================================================================
// event mapping
// =============================================================================

#[test]
fn test_watch_op_mapping() {
    use notify::event::{ModifyKind, RenameMode};
    use notify::EventKind;

    assert_eq!(watch_op(&modify_kind()), Some(WatchOp::Write));
    assert_eq!(watch_op(&create_kind()), Some(WatchOp::Create));
    assert_eq!(
        watch_op(&EventKind::Remove(notify::event::RemoveKind::File)),
        Some(WatchOp::Remove)
    );
    assert_eq!(
        watch_op(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
        Some(WatchOp::Rename)
    );
    assert_eq!(watch_op(&metadata_kind()), None);
}

#[test]
fn test_temp_files_dropped() {
    assert!(is_temp_file(&PathBuf::from("/site/web/.styles.css.swp")));
    assert!(is_temp_file(&PathBuf::from("/site/web/styles.css~")));
    assert!(is_temp_file(&PathBuf::from("/site/web/4913.tmp")));
    assert!(!is_temp_file(&PathBuf::from("/site/web/styles.css")));

    let event = make_event(vec!["/site/a.css", "/site/.a.css.swp"], modify_kind());
    assert_eq!(to_watch_events(&event), vec![write("/site/a.css")]);
}

#[test]
fn test_metadata_events_ignored() {
    let event = make_event(vec!["/site/a.css"], metadata_kind());
    assert!(to_watch_events(&event).is_empty());
}

#[test]
fn test_watch_roots_register_every_directory() {
    let temp = TempDir::new().unwrap();
    let web = temp.path().join("web");
    std::fs::create_dir_all(web.join("templates/partials")).unwrap();
    std::fs::write(web.join("styles.css"), "").unwrap();
    let missing = temp.path().join("src");

    let mut watcher = RecordingWatcher::default();
    let mut roots = WatchRoots::new(vec![web.clone(), missing.clone()]);
    roots.attach_existing(&mut watcher).unwrap();

    let watched = watcher.watched();
    assert!(watched.contains(&web));
    assert!(watched.contains(&web.join("templates")));
    assert!(watched.contains(&web.join("templates/partials")));
    assert_eq!(watched.len(), 3);

    // Missing root appears later
    std::fs::create_dir_all(missing.join("actor")).unwrap();
    roots.maintain(&mut watcher);
    let watched = watcher.watched();
    assert!(watched.contains(&missing));
    assert!(watched.contains(&missing.join("actor")));

    // New directory under a watched root
    let fresh = web.join("fresh");
    std::fs::create_dir(&fresh).unwrap();
    roots.on_created(&mut watcher, &fresh);
    roots.on_created(&mut watcher, &web.join("styles.css"));
    assert!(watcher.watched().contains(&fresh));
    assert_eq!(roots.attached_count(), 6);
}

#[test]
fn test_removed_directory_is_forgotten_with_descendants() {
    let temp = TempDir::new().unwrap();
    let web = temp.path().join("web");
    std::fs::create_dir_all(web.join("templates/partials")).unwrap();
    std::fs::create_dir_all(web.join("css")).unwrap();

    let mut watcher = RecordingWatcher::default();
    let mut roots = WatchRoots::new(vec![web.clone()]);
    roots.attach_existing(&mut watcher).unwrap();
    assert_eq!(roots.attached_count(), 4);

    std::fs::remove_dir_all(web.join("templates")).unwrap();
    roots.on_removed(&mut watcher, &web.join("templates"));
    assert_eq!(roots.attached_count(), 2);

    // Same path, new directory: registered again
    std::fs::create_dir(web.join("templates")).unwrap();
    watcher.watched.lock().clear();
    roots.on_created(&mut watcher, &web.join("templates"));
    assert_eq!(watcher.watched(), vec![web.join("templates")]);
    assert_eq!(roots.attached_count(), 3);
}

// =============================================================================
// debouncer
// =============================================================================

#[test]
fn test_debouncer_idle() {
    let mut debouncer = Debouncer::new(WINDOW);
    let now = Instant::now();

    assert!(!debouncer.is_armed());
    assert!(debouncer.take_if_due(now + WINDOW * 10).is_none());
    assert!(debouncer.sleep_deadline(now) > now + Duration::from_secs(3600));
}

#[test]
fn test_debouncer_last_event_wins() {
    let mut debouncer = Debouncer::new(WINDOW);
    let t0 = Instant::now();

    debouncer.arm(write("a.css"), t0);
    debouncer.arm(write("b.tmpl"), t0 + Duration::from_millis(30));

    // Deadline moved with the second event
    assert_eq!(
        debouncer.deadline(),
        Some(t0 + Duration::from_millis(30) + WINDOW)
    );
    assert!(debouncer.take_if_due(t0 + WINDOW).is_none());

    let fired = debouncer.take_if_due(t0 + Duration::from_millis(180));
    assert_eq!(fired, Some(write("b.tmpl")));
    assert!(matches!(debouncer.pending, Pending::Idle));

    // Exactly once
    assert!(debouncer.take_if_due(t0 + WINDOW * 10).is_none());
}

// =============================================================================
// detector loop (paused clock)
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_one_trigger() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(1);

    event_tx
        .send(make_event(vec!["/site/web/a.css"], modify_kind()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    event_tx
        .send(make_event(vec!["/site/web/b.css"], modify_kind()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/b.css"));
    assert!(trigger_rx.try_recv().is_err());

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_fires_only_after_quiet_window() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(1);

    event_tx
        .send(make_event(vec!["/site/web/a.css"], modify_kind()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(trigger_rx.try_recv().is_err());

    // Reset before the first deadline: fires 150ms after this event, not the first
    event_tx
        .send(make_event(vec!["/site/web/a.css"], modify_kind()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(trigger_rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(trigger_rx.try_recv().is_ok());

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_separate_bursts_fire_separately() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(4);

    for name in ["/site/web/a.css", "/site/web/b.css"] {
        event_tx
            .send(make_event(vec![name], modify_kind()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/a.css"));
    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/b.css"));

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_non_qualifying_events_never_arm() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(1);

    event_tx
        .send(make_event(vec!["/site/web/new.css"], create_kind()))
        .await
        .unwrap();
    event_tx
        .send(make_event(vec!["/site/notes.txt"], modify_kind()))
        .await
        .unwrap();
    event_tx
        .send(make_event(vec!["/site/web/a.css"], metadata_kind()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(trigger_rx.try_recv().is_err());

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bursts_queue_while_build_is_busy() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(8);

    // Three bursts while nobody drains the trigger channel
    for name in ["/site/web/a.css", "/site/web/b.tmpl", "/site/web/c.css"] {
        event_tx
            .send(make_event(vec![name], modify_kind()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/a.css"));
    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/b.tmpl"));
    assert_eq!(trigger_rx.try_recv().unwrap(), write("/site/web/c.css"));
    assert!(trigger_rx.try_recv().is_err());

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_recreated_directory_is_watched_again() {
    let temp = TempDir::new().unwrap();
    let web = temp.path().join("web");
    let partials = web.join("partials");
    std::fs::create_dir_all(&partials).unwrap();

    let mut watcher = RecordingWatcher::default();
    let mut roots = WatchRoots::new(vec![web.clone()]);
    roots.attach_existing(&mut watcher).unwrap();
    let log = watcher.log();
    let (event_tx, _trigger_rx, token, handle) = spawn_detector_with(1, watcher, roots);

    std::fs::remove_dir(&partials).unwrap();
    let removed = make_event(vec![partials.to_str().unwrap()], remove_dir_kind());
    event_tx.send(removed).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    log.lock().clear();
    std::fs::create_dir(&partials).unwrap();
    let created = make_event(vec![partials.to_str().unwrap()], create_dir_kind());
    event_tx.send(created).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(*log.lock(), vec![partials.clone()]);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_missing_root_attached_without_events() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");

    let watcher = RecordingWatcher::default();
    let log = watcher.log();
    let (_event_tx, _trigger_rx, token, handle) =
        spawn_detector_with(1, watcher, WatchRoots::new(vec![src.clone()]));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(log.lock().is_empty());

    // No notify event and no pending change: only the maintenance tick runs.
    std::fs::create_dir_all(src.join("actor")).unwrap();
    tokio::time::sleep(MAINTAIN_INTERVAL * 2).await;

    let watched = log.lock().clone();
    assert!(watched.contains(&src), "{watched:?}");
    assert!(watched.contains(&src.join("actor")), "{watched:?}");

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_pending_change() {
    let (event_tx, mut trigger_rx, token, handle) = spawn_detector(1);

    event_tx
        .send(make_event(vec!["/site/web/a.css"], modify_kind()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    token.cancel();
    handle.await.unwrap();

    assert!(trigger_rx.try_recv().is_err());
}

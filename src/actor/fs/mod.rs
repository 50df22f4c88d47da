//! FileSystem Actor
//!
//! Watches the configured roots and hands one debounced event per change
//! burst to the BuildActor.
//!
//! Architecture:
//! ```text
//! notify thread → bridge → Detector (filter → Debouncer) → trigger channel
//! ```
//!
//! The watcher is created and subscribed in `FsActor::new`, so a failed
//! subscription is reported before any task starts.

use std::path::PathBuf;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::messages::WatchEvent;
use crate::config::ReloadConfig;

// Pure timing: last event wins.
mod debouncer;
// Which events may arm the debouncer.
mod filter;
// notify event mapping and temp-file rules.
mod types;
// Watch root attach/re-attach lifecycle.
mod watch_roots;

#[cfg(test)]
mod tests;

pub use filter::EventFilter;

use debouncer::Debouncer;
use types::to_watch_events;
use watch_roots::WatchRoots;

/// Buffer between the notify thread and the detector task
const BRIDGE_BUFFER: usize = 256;

/// How often missing or lost watch roots are looked for
pub(super) const MAINTAIN_INTERVAL: Duration = Duration::from_secs(2);

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    detector: Detector<RecommendedWatcher>,
}

impl FsActor {
    /// Create the watcher and subscribe every existing root.
    ///
    /// Events buffer in `notify_rx` until `run` is called.
    pub fn new(
        config: &ReloadConfig,
        trigger_tx: mpsc::Sender<WatchEvent>,
    ) -> notify::Result<Self> {
        // Create sync channel for notify (it doesn't support async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(config.watch.clone());
        watch_roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "{} directories watched", watch_roots.attached_count());

        let detector = Detector::new(
            watcher,
            watch_roots,
            EventFilter::new(config.extensions.iter().cloned())
                .with_ignored(config.ignore.iter().cloned()),
            config.debounce(),
            trigger_tx,
        );

        Ok(Self {
            notify_rx,
            detector,
        })
    }

    /// Run until `token` is cancelled or the BuildActor goes away.
    pub async fn run(self, token: CancellationToken) {
        let notify_rx = self.notify_rx;
        let (async_tx, async_rx) = mpsc::channel::<notify::Event>(BRIDGE_BUFFER);

        // Blocking pool thread: ends once the watcher (and its sender) is dropped
        let bridge = tokio::task::spawn_blocking(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Detector stopped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        // Dropping the detector drops the watcher, which closes the bridge.
        self.detector.run(async_rx, token).await;
        let _ = bridge.await;
        crate::debug!("watch"; "stopped");
    }
}

// =============================================================================
// Detector
// =============================================================================

/// Detector loop state, generic over the watcher so tests can drive it
/// without touching the OS.
pub(super) struct Detector<W: Watcher> {
    watcher: W,
    watch_roots: WatchRoots,
    filter: EventFilter,
    debouncer: Debouncer,
    trigger_tx: mpsc::Sender<WatchEvent>,
}

impl<W: Watcher> Detector<W> {
    pub(super) fn new(
        watcher: W,
        watch_roots: WatchRoots,
        filter: EventFilter,
        window: std::time::Duration,
        trigger_tx: mpsc::Sender<WatchEvent>,
    ) -> Self {
        Self {
            watcher,
            watch_roots,
            filter,
            debouncer: Debouncer::new(window),
            trigger_tx,
        }
    }

    /// Wait on shutdown, the next notify event, the debounce deadline and
    /// the maintenance tick; handle whichever is ready first.
    pub(super) async fn run(
        mut self,
        mut rx: mpsc::Receiver<notify::Event>,
        token: CancellationToken,
    ) {
        let mut maintenance =
            tokio::time::interval_at(Instant::now() + MAINTAIN_INTERVAL, MAINTAIN_INTERVAL);
        maintenance.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let wake_at = self.debouncer.sleep_deadline(Instant::now());

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    if self.debouncer.is_armed() {
                        crate::debug!("watch"; "shutdown with pending change, not rebuilding");
                    }
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => self.on_notify(&event),
                    None => break,
                },
                _ = tokio::time::sleep_until(wake_at) => {
                    if self.fire().is_err() {
                        break;
                    }
                }
                _ = maintenance.tick() => {
                    // Roots that were missing, or removed and recreated.
                    self.watch_roots.maintain(&mut self.watcher);
                }
            }
        }
    }

    fn on_notify(&mut self, event: &notify::Event) {
        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        // Structural change: directories gone or renamed away lose their
        // subscription, new ones need their own.
        let renamed = matches!(event.kind, EventKind::Modify(ModifyKind::Name(_)));
        if event.kind.is_remove() || renamed {
            for path in event.paths.iter().filter(|p| !p.exists()) {
                self.watch_roots.on_removed(&mut self.watcher, path);
            }
        }
        if event.kind.is_create() || renamed {
            for path in &event.paths {
                self.watch_roots.on_created(&mut self.watcher, path);
            }
        }

        let now = Instant::now();
        for watch_event in to_watch_events(event) {
            if self.filter.qualifies(&watch_event) {
                self.debouncer.arm(watch_event, now);
            }
        }
    }

    /// Hand the pending event to the BuildActor if its deadline passed.
    ///
    /// Returns `Err(())` if the BuildActor shut down.
    fn fire(&mut self) -> Result<(), ()> {
        let Some(event) = self.debouncer.take_if_due(Instant::now()) else {
            return Ok(());
        };

        crate::debug!("watch"; "{} {}", event.op.label(), event.path.display());

        match self.trigger_tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                crate::log!("watch"; "rebuild already pending, skipping {}", event.path.display());
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(()),
        }
    }
}

/// Watch roots resolved from config, for display.
pub fn describe_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Build Actor
//!
//! Receives fired events from the FsActor, runs the external build (one at a
//! time) and enqueues a notification for the WsActor. Events that queued up
//! during a build are folded into one rebuild (see `WatchEvent::merge`).
//!
//! A failed build is logged and shown on the status line; browsers are
//! notified either way.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::WatchEvent;
use crate::config::BuildConfig;
use crate::hooks::{BuildError, run_build};
use crate::logger::{status_error, status_success, status_warning};
use crate::reload::message::NotificationMessage;
use crate::reload::queue::{Enqueue, NotifySender};

/// Build Actor - serial rebuild + notify
pub struct BuildActor {
    rx: mpsc::Receiver<WatchEvent>,
    build: BuildConfig,
    root: PathBuf,
    notify: NotifySender,
}

impl BuildActor {
    pub fn new(
        rx: mpsc::Receiver<WatchEvent>,
        build: BuildConfig,
        root: PathBuf,
        notify: NotifySender,
    ) -> Self {
        Self {
            rx,
            build,
            root,
            notify,
        }
    }

    /// Run until cancelled or the FsActor goes away.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => self.coalesce(event),
                    None => break,
                },
            };

            if self.handle(&event, &token).await.is_err() {
                break;
            }
        }
        crate::debug!("build"; "stopped");
    }

    /// Fold every event already waiting into `first`.
    fn coalesce(&mut self, first: WatchEvent) -> WatchEvent {
        let mut event = first;
        let mut folded = 0;
        while let Ok(next) = self.rx.try_recv() {
            event = event.merge(next);
            folded += 1;
        }
        if folded > 0 {
            crate::debug!("build"; "{} queued change(s) folded into one rebuild", folded);
        }
        event
    }

    /// Returns `Err(())` when shutting down.
    async fn handle(&self, event: &WatchEvent, token: &CancellationToken) -> Result<(), ()> {
        let name = self.display_path(event);
        crate::log!("watch"; "file modified: {}", name);

        if self.build.is_active() {
            match run_build(&self.build, &self.root, "serve", token).await {
                Ok(()) => status_success(&format!("rebuilt after {} changed", name)),
                Err(BuildError::Cancelled { .. }) => return Err(()),
                Err(e) => {
                    crate::log!("error"; "error running {}: {}", self.build.display_name(), e);
                    status_error(&format!("build failed after {} changed", name), &e.to_string());
                }
            }
        }

        let message = NotificationMessage::from(event);
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                crate::log!("error"; "error encoding notification: {}", e);
                return Ok(());
            }
        };

        match self.notify.enqueue(json) {
            Enqueue::Accepted => Ok(()),
            Enqueue::Dropped => {
                status_warning(&format!("reload for {} dropped, browsers are behind", name));
                Ok(())
            }
            Enqueue::Closed => Err(()),
        }
    }

    fn display_path(&self, event: &WatchEvent) -> String {
        event
            .path
            .strip_prefix(&self.root)
            .unwrap_or(&event.path)
            .display()
            .to_string()
    }
}

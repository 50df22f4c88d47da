//! Notification Queue
//!
//! Bounded FIFO between the build trigger and the broadcaster.
//!
//! Producers never block: when the queue is full the *new* message is
//! dropped and logged. Messages already queued are never evicted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default number of undelivered messages held
pub const DEFAULT_CAPACITY: usize = 100;

/// Outcome of an enqueue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    /// Queue was full; the message was discarded
    Dropped,
    /// Consumer is gone (shutting down)
    Closed,
}

/// Constructor namespace for the sender/receiver pair.
pub struct NotificationQueue;

impl NotificationQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (NotifySender, NotifyReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        (
            NotifySender {
                tx,
                dropped: Arc::clone(&dropped),
            },
            NotifyReceiver { rx, dropped },
        )
    }
}

/// Producer half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotifySender {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl NotifySender {
    /// Offer a serialized message without waiting.
    pub fn enqueue(&self, message: String) -> Enqueue {
        match self.tx.try_send(message) {
            Ok(()) => Enqueue::Accepted,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                crate::log!("reload"; "queue full, message dropped ({} so far)", total);
                Enqueue::Dropped
            }
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half. Single consumer.
#[derive(Debug)]
pub struct NotifyReceiver {
    rx: mpsc::Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl NotifyReceiver {
    /// Wait for the next message; `None` once every sender is gone.
    pub async fn dequeue(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub fn try_dequeue(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

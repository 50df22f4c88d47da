//! WebSocket Actor - Broadcast
//!
//! Single consumer of the notification queue. Each dequeued message is
//! fanned out to a snapshot of the connection registry by queueing it on
//! every connection's session, so a cycle never waits on a socket.
//!
//! # Architecture
//!
//! ```text
//! BuildActor --[JSON]--> NotificationQueue --> WsActor --[text frame]--> Clients
//!                                                 ^
//!                              reload::server ----+ (registers connections)
//! ```

mod delivery;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use delivery::broadcast;

use crate::reload::queue::NotifyReceiver;
use crate::reload::registry::ConnectionRegistry;

/// How long shutdown waits for sessions to send their close frames
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// WebSocket Actor - drains the queue and broadcasts
pub struct WsActor {
    rx: NotifyReceiver,
    registry: Arc<ConnectionRegistry>,
}

impl WsActor {
    pub fn new(rx: NotifyReceiver, registry: Arc<ConnectionRegistry>) -> Self {
        Self { rx, registry }
    }

    /// Run until cancelled or every producer is gone, then close all
    /// connections.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            let message = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                message = self.rx.dequeue() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let report = broadcast(&self.registry, Arc::from(message));
            if report.evicted > 0 {
                crate::debug!("ws"; "{} client(s) evicted, {} remaining", report.evicted, self.registry.len());
            }
        }

        let dropped = self.rx.dropped();
        if dropped > 0 {
            crate::debug!("ws"; "{} notification(s) were dropped while the queue was full", dropped);
        }

        let clients = self.registry.drain();
        let count = clients.len();
        if count > 0 {
            tokio::task::spawn_blocking(move || {
                for conn in &clients {
                    conn.close();
                }
                for conn in &clients {
                    if !conn.wait_closed(CLOSE_GRACE) {
                        crate::debug!("ws"; "client {} did not close in time", conn.id());
                    }
                }
            })
            .await
            .ok();
        }
        crate::debug!("ws"; "shutting down, closed {} connection(s)", count);
    }
}

use std::sync::Arc;

use crate::reload::registry::{Connection, ConnectionRegistry, SendError};

/// Result of one broadcast cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub queued: usize,
    pub evicted: usize,
}

/// Queue `message` on every connection in the current snapshot.
///
/// Never waits on a socket: each connection's session writes on its own
/// thread. A connection that is closed, or whose outbound queue is full, is
/// removed from the registry and closed; the others are unaffected.
pub fn broadcast(registry: &ConnectionRegistry, message: Arc<str>) -> BroadcastReport {
    let snapshot = registry.snapshot();
    if snapshot.is_empty() {
        crate::debug!("ws"; "no clients connected");
        return BroadcastReport::default();
    }

    let mut report = BroadcastReport::default();
    for conn in snapshot {
        match conn.send(Arc::clone(&message)) {
            Ok(()) => report.queued += 1,
            Err(e) => {
                match e {
                    SendError::Backlog => crate::log!("ws"; "client {} evicted: {}", conn.id(), e),
                    _ => crate::debug!("ws"; "client {} disconnected: {}", conn.id(), e),
                }
                evict(registry, &conn);
                report.evicted += 1;
            }
        }
    }

    crate::debug!("ws"; "broadcast to {} clients", report.queued);
    report
}

fn evict(registry: &ConnectionRegistry, conn: &Connection) {
    if registry.remove(conn.id()).is_some() {
        conn.close();
    }
}

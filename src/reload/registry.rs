//! Connection Registry
//!
//! Set of open browser connections, keyed by a stable id so that removal
//! never disturbs other entries.
//!
//! Every connection is driven by its own session thread, the only code that
//! touches its socket. The session:
//! - writes frames taken from a small outbound queue
//! - polls the socket for a close frame or a dead peer between writes
//! - removes itself from the registry when the peer is gone
//!
//! Broadcasting only pushes onto outbound queues, so one stalled socket never
//! holds back the others. Sends never happen under the registry lock.

use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

/// Frames a connection may have waiting before it counts as stalled
pub const OUTBOUND_BUFFER: usize = 32;

/// How long a session waits for outbound frames before polling the socket
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a write to a connection failed
#[derive(Debug, Error)]
pub enum SendError {
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("connection closed")]
    Closed,

    #[error("client is not keeping up ({n} frames pending)", n = OUTBOUND_BUFFER)]
    Backlog,
}

/// Anything a text frame can be written to.
///
/// Implemented for `tungstenite::WebSocket`; tests use in-memory sinks.
pub trait ClientSink: Send {
    fn send_text(&mut self, text: &str) -> Result<(), SendError>;

    /// Check for input without blocking for long. Returns `true` once the
    /// peer has closed or the socket is dead.
    fn poll_closed(&mut self) -> bool;

    /// Best-effort close; errors are ignored.
    fn close(&mut self);
}

impl<S: Read + Write + Send> ClientSink for WebSocket<S> {
    fn send_text(&mut self, text: &str) -> Result<(), SendError> {
        if !self.can_write() {
            return Err(SendError::Closed);
        }
        self.send(Message::text(text))?;
        Ok(())
    }

    /// Expects the socket to have a short read timeout.
    fn poll_closed(&mut self) -> bool {
        match self.read() {
            Ok(Message::Close(_)) => {
                // Push out the queued close reply.
                let _ = self.flush();
                true
            }
            // Anything else a browser sends is ignored.
            Ok(_) => false,
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                false
            }
            Err(_) => true,
        }
    }

    fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "server shutting down".into(),
        };
        if WebSocket::close(self, Some(frame)).is_ok() {
            // Push the close frame out; the peer's reply is not awaited.
            let _ = self.flush();
        }
    }
}

/// Stable connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered connection: the sending side of its session.
pub struct Connection {
    id: ConnId,
    /// `None` once closing was requested
    outbound: Mutex<Option<Sender<Arc<str>>>>,
    open: Arc<AtomicBool>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Whether the session is still serving the socket.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a frame without waiting for the socket.
    pub fn send(&self, text: Arc<str>) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(SendError::Closed);
        };
        tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Backlog,
            TrySendError::Disconnected(_) => SendError::Closed,
        })
    }

    /// Ask the session to flush what is queued, send a close frame and exit.
    pub fn close(&self) {
        self.outbound.lock().take();
    }

    /// Wait up to `grace` for the session thread to exit.
    ///
    /// Returns `false` if it is still running (a write is stuck).
    pub fn wait_closed(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while self.is_open() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if let Some(handle) = self.session.lock().take() {
            let _ = handle.join();
        }
        true
    }
}

/// Shared registry of open connections
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    clients: Mutex<FxHashMap<ConnId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection, start its session and return its id.
    pub fn register(self: &Arc<Self>, sink: Box<dyn ClientSink>) -> std::io::Result<ConnId> {
        let id = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = channel::bounded(OUTBOUND_BUFFER);
        let open = Arc::new(AtomicBool::new(true));
        let conn = Arc::new(Connection {
            id,
            outbound: Mutex::new(Some(tx)),
            open: Arc::clone(&open),
            session: Mutex::new(None),
        });

        // Registered first so a session ending right away still finds itself.
        self.clients.lock().insert(id, Arc::clone(&conn));

        let session = Session {
            id,
            sink,
            rx,
            open,
            registry: Arc::downgrade(self),
        };
        match thread::Builder::new()
            .name(format!("kittens-ws-{}", id.0))
            .spawn(move || session.run())
        {
            Ok(handle) => {
                *conn.session.lock() = Some(handle);
                Ok(id)
            }
            Err(e) => {
                self.clients.lock().remove(&id);
                conn.open.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Remove a connection. Returns it if it was still registered.
    pub fn remove(&self, id: ConnId) -> Option<Arc<Connection>> {
        self.clients.lock().remove(&id)
    }

    /// Current connections, taken under the lock and released before use.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        let mut conns: Vec<_> = self.clients.lock().values().cloned().collect();
        conns.sort_by_key(|c| c.id);
        conns
    }

    #[cfg(test)]
    pub fn contains(&self, id: ConnId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Remove every connection (shutdown).
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        let mut clients = self.clients.lock();
        clients.drain().map(|(_, conn)| conn).collect()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Owner of one socket, running on its own thread.
struct Session {
    id: ConnId,
    sink: Box<dyn ClientSink>,
    rx: Receiver<Arc<str>>,
    open: Arc<AtomicBool>,
    registry: Weak<ConnectionRegistry>,
}

/// Why a session ended
enum End {
    ClosedByServer,
    ClosedByClient,
    Failed(String),
    Panicked,
}

impl Session {
    fn run(mut self) {
        let end = self.serve();

        if !matches!(end, End::ClosedByClient) {
            let sink = &mut self.sink;
            // The sink may be half-broken after a panic; close is best-effort.
            let _ = catch_unwind(AssertUnwindSafe(|| sink.close()));
        }
        self.open.store(false, Ordering::Release);

        let evicted = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id).is_some());

        match end {
            End::ClosedByServer => crate::debug!("ws"; "client {} closed", self.id),
            End::ClosedByClient => crate::debug!("ws"; "client {} disconnected", self.id),
            End::Failed(reason) => {
                crate::debug!("ws"; "client {} disconnected: {}", self.id, reason)
            }
            End::Panicked => {
                crate::log!("ws"; "recovered from panic while serving client {}", self.id)
            }
        }
        if evicted {
            crate::debug!("ws"; "client {} evicted", self.id);
        }
    }

    fn serve(&mut self) -> End {
        loop {
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(text) => {
                    let sink = &mut self.sink;
                    match catch_unwind(AssertUnwindSafe(|| sink.send_text(&text))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => return End::Failed(e.to_string()),
                        Err(_) => return End::Panicked,
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return End::ClosedByServer,
            }

            let sink = &mut self.sink;
            match catch_unwind(AssertUnwindSafe(|| sink.poll_closed())) {
                Ok(false) => {}
                Ok(true) => return End::ClosedByClient,
                Err(_) => return End::Panicked,
            }
        }
    }
}

// =============================================================================
// Test sinks
// =============================================================================

//! WebSocket Server for Live Reload
//!
//! A non-blocking TCP listener with a single route, `/ws`. Each accepted
//! socket is handshaken on its own short-lived thread; upgraded connections
//! are greeted and handed to the registry, whose session thread owns them
//! from then on.

use std::io::{Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tungstenite::handshake::HandshakeError;

use super::registry::{ClientSink, ConnectionRegistry};
use crate::utils::mime::types::PLAIN;
use crate::utils::net::bind_tcp;

/// Route accepting upgrade requests
pub const WS_PATH: &str = "/ws";

/// First frame every new connection receives
pub const GREETING: &str = "connection established";

/// Sleep between accept attempts when nothing is pending
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Time a client gets to send its request head
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest a single frame write may block before the client counts as dead
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout while a session polls for close frames
const POLL_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// Largest request head looked at before the handshake
const MAX_HEAD: usize = 8 * 1024;

/// Bound reload endpoint
pub struct ReloadServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ReloadServer {
    /// Bind the endpoint. The port may differ from `port` if it was in use.
    pub fn bind(interface: IpAddr, port: u16) -> Result<Self> {
        let (listener, addr) = bind_tcp("reload", interface, port)?;
        listener
            .set_nonblocking(true)
            .context("failed to make listener non-blocking")?;
        Ok(Self { listener, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept loop (blocking). Returns once `token` is cancelled.
    pub fn run(&self, registry: &Arc<ConnectionRegistry>, token: &CancellationToken) {
        crate::debug!("reload"; "ws://{}{}", self.addr, WS_PATH);

        while !token.is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let registry = Arc::clone(registry);
                    let token = token.clone();
                    let spawned = thread::Builder::new()
                        .name("kittens-handshake".into())
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, peer, &registry, &token) {
                                crate::log!("reload"; "websocket handshake error: {:#}", e);
                            }
                        });
                    if let Err(e) = spawned {
                        crate::log!("reload"; "failed to spawn handshake thread: {}", e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    crate::log!("reload"; "accept error: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
        crate::debug!("reload"; "acceptor stopped");
    }
}

/// Handshake one socket and register it.
fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &Arc<ConnectionRegistry>,
    token: &CancellationToken,
) -> Result<()> {
    // Accepted sockets may inherit non-blocking mode from the listener.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    let head = peek_head(&stream)?;
    let path = request_path(&head);

    if token.is_cancelled() {
        return reject(stream, head.len(), "503 Service Unavailable", "503 Service Unavailable");
    }
    if path != Some(WS_PATH) {
        return reject(stream, head.len(), "404 Not Found", "404 Not Found");
    }

    let mut ws = match tungstenite::accept(stream.try_clone()?) {
        Ok(ws) => ws,
        Err(HandshakeError::Failure(e)) => {
            crate::debug!("reload"; "rejected request from {}: {}", peer, e);
            // The head was consumed by the handshake attempt.
            return reject(stream, 0, "400 Bad Request", "Not a WebSocket handshake request");
        }
        Err(HandshakeError::Interrupted(_)) => bail!("handshake with {} interrupted", peer),
    };

    ws.send_text(GREETING)
        .map_err(|e| anyhow::anyhow!("error sending greeting: {}", e))?;
    stream.set_read_timeout(Some(POLL_READ_TIMEOUT))?;

    let id = registry
        .register(Box::new(ws))
        .context("failed to start connection session")?;
    crate::debug!("reload"; "client {} connected from {}", id, peer);

    // Shutdown may have drained the registry while we were registering.
    if token.is_cancelled() {
        if let Some(conn) = registry.remove(id) {
            conn.close();
        }
    }
    Ok(())
}

/// Wait for a complete request head and return it without consuming it.
fn peek_head(stream: &TcpStream) -> Result<Vec<u8>> {
    let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
    let mut buf = vec![0u8; MAX_HEAD];

    loop {
        let n = stream.peek(&mut buf)?;
        if n == 0 {
            bail!("connection closed before the request was sent");
        }
        if let Some(end) = buf[..n].windows(4).position(|w| w == b"\r\n\r\n") {
            buf.truncate(end + 4);
            return Ok(buf);
        }
        if n == MAX_HEAD {
            buf.truncate(n);
            return Ok(buf);
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for the request head");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Path of the request line, without the query string.
fn request_path(head: &[u8]) -> Option<&str> {
    let line = head.split(|&b| b == b'\r').next()?;
    let line = std::str::from_utf8(line).ok()?;
    let target = line.split(' ').nth(1)?;
    target.split('?').next()
}

/// Answer with a plain-text error and close.
///
/// `unread` bytes of the request are consumed first so the close is clean.
fn reject(mut stream: TcpStream, unread: usize, status: &str, body: &str) -> Result<()> {
    if unread > 0 {
        let mut head = vec![0u8; unread];
        stream.read_exact(&mut head)?;
    }
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: {PLAIN}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);
    Ok(())
}

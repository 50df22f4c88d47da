//! Listener binding shared by the site server and the reload endpoint.

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr, TcpListener};

use anyhow::Result;
use tiny_http::Server;

use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind an HTTP server, retrying on the following ports.
pub fn bind_http(label: &str, interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    bind_with_retry(label, interface, base_port, |addr| {
        let server = Server::http(addr)?;
        // Port 0 asks the OS; report what we actually got.
        let bound = server.server_addr().to_ip().unwrap_or(addr);
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>((server, bound))
    })
}

/// Bind a plain TCP listener, retrying on the following ports.
pub fn bind_tcp(label: &str, interface: IpAddr, base_port: u16) -> Result<(TcpListener, SocketAddr)> {
    bind_with_retry(label, interface, base_port, |addr| {
        let listener = TcpListener::bind(addr)?;
        let bound = listener.local_addr()?;
        Ok::<_, std::io::Error>((listener, bound))
    })
}

/// Bind to the specified interface and port, with automatic port retry.
///
/// `label` is the log module used when a fallback port is picked. `bind`
/// returns the listener together with the address it actually holds.
fn bind_with_retry<T, E: Display>(
    label: &str,
    interface: IpAddr,
    base_port: u16,
    bind: impl Fn(SocketAddr) -> Result<(T, SocketAddr), E>,
) -> Result<(T, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);

        match bind(SocketAddr::new(interface, port)) {
            Ok((listener, addr)) => {
                if offset > 0 {
                    log!(label; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.unwrap_or_default()
    ))
}

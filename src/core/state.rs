//! Process-wide shutdown state.
//!
//! A single Ctrl+C handler fans the signal out to everything that
//! registered for it: the live-reload cancellation token and each
//! blocking tiny_http server loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tiny_http::Server;
use tokio_util::sync::CancellationToken;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP servers to unblock on shutdown
static SERVERS: Mutex<Vec<Arc<Server>>> = Mutex::new(Vec::new());

/// Cancellation tokens of running live-reload services
static TOKENS: Mutex<Vec<CancellationToken>> = Mutex::new(Vec::new());

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Nothing registered yet: exit immediately
/// - Otherwise: cancel tokens, unblock servers, let callers unwind
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: stop waiting for a graceful exit
            std::process::exit(130);
        }

        let had_work = trigger_shutdown();
        if !had_work {
            std::process::exit(0);
        }
        crate::log!("serve"; "shutting down...");
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Cancel every registered token and unblock every registered server.
///
/// Returns whether anything was registered.
fn trigger_shutdown() -> bool {
    let tokens = TOKENS.lock();
    let servers = SERVERS.lock();

    for token in tokens.iter() {
        token.cancel();
    }
    for server in servers.iter() {
        server.unblock();
    }

    !tokens.is_empty() || !servers.is_empty()
}

/// Register an HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>) {
    SERVERS.lock().push(server);
}

/// Register a live-reload cancellation token
pub fn register_shutdown_token(token: CancellationToken) {
    if is_shutdown() {
        token.cancel();
    }
    TOKENS.lock().push(token);
}

/// Check if shutdown has been requested
///
/// Relaxed ordering: the worst case is one more loop iteration
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// =============================================================================
// Tests
// =============================================================================

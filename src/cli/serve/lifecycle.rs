//! Live reload service lifecycle.

use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::{
    actor::{LiveReload, LiveReloadHandle},
    config::SiteConfig,
    core::register_shutdown_token,
    log,
};

/// How long shutdown waits for the live reload thread
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Start the live reload service if enabled.
///
/// Returns the running handle and the port the endpoint actually bound.
pub fn start_live_reload(config: &SiteConfig) -> Result<Option<(LiveReloadHandle, u16)>> {
    if !config.serve.live_reload {
        crate::debug!("serve"; "live reload disabled");
        return Ok(None);
    }

    let service = LiveReload::new(config)?;
    let addr = service.addr();
    register_shutdown_token(service.token());

    let handle = service.start()?;
    log!("reload"; "ws://{}/ws", addr);
    Ok(Some((handle, addr.port())))
}

/// Stop the live reload service, waiting at most `SHUTDOWN_GRACE`.
pub fn wait_for_shutdown(handle: Option<LiveReloadHandle>) {
    let Some(handle) = handle else { return };
    handle.cancel();

    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < SHUTDOWN_GRACE {
        if handle.is_finished() {
            handle.join();
            return;
        }
        thread::sleep(step);
        waited += step;
    }
    log!("reload"; "live reload did not stop in time");
}

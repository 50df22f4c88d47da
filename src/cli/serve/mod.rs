//! Development server with live reload support.

mod content;
mod lifecycle;
mod path;
mod response;

use crate::{config::cfg, core::register_server, log, utils::net::bind_http};
use anyhow::{Context, Result};
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Per-request view of the serve settings
struct ServeContext {
    root: std::path::PathBuf,
    /// Actual reload port when live reload is running
    reload_port: Option<u16>,
}

/// Serve `serve.root` until shutdown, running the live reload service
/// alongside when enabled.
pub fn serve_site() -> Result<()> {
    let config = cfg();
    let (server, addr) = bind_http("serve", config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));

    let live_reload = lifecycle::start_live_reload(&config)?;
    let reload_port = live_reload.as_ref().map(|(_, port)| *port);

    if !config.serve.root.is_dir() {
        log!("serve"; "{} does not exist yet", config.root_relative(&config.serve.root).display());
    }
    log!("serve"; "http://{}", addr);

    let ctx = Arc::new(ServeContext {
        root: config.serve.root.clone(),
        reload_port,
    });
    let result = run_request_loop(&server, ctx);

    lifecycle::wait_for_shutdown(live_reload.map(|(handle, _)| handle));
    result
}

fn run_request_loop(server: &Server, ctx: Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .thread_name(|i| format!("kittens-serve-{i}"))
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    // Served from memory, only while live reload runs
    if let Some(port) = ctx.reload_port
        && request.url() == crate::embed::serve::LIVERELOAD_PATH
    {
        return response::respond_livereload_js(request, port);
    }

    if let Some(path) = path::resolve_path(request.url(), &ctx.root) {
        return response::respond_file(request, &path, ctx.reload_port);
    }

    response::respond_not_found(request, &ctx.root, ctx.reload_port)
}

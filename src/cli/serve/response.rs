//! HTTP response handlers.

use super::content::maybe_inject_livereload;
use crate::utils::mime::types::{HTML, JAVASCRIPT, PLAIN};
use anyhow::{Context, Result, anyhow};
use std::{fs, path::Path};
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// Respond with a static file, injecting the reload script into HTML.
pub fn respond_file(request: Request, path: &Path, reload_port: Option<u16>) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject_livereload(body, content_type, reload_port);

    send_body(request, 200, content_type, body)
}

/// Respond with 404 page (`404.html` under the serve root, or the built-in one).
pub fn respond_not_found(request: Request, root: &Path, reload_port: Option<u16>) -> Result<()> {
    use crate::embed::serve::{NOT_FOUND_HTML, NotFoundVars};

    if is_head_request(&request) {
        return send_head(request, 404, HTML);
    }

    let custom_404 = root.join("404.html");
    let body = match fs::read(&custom_404) {
        Ok(body) => body,
        Err(_) => {
            let path = request.url().split('?').next().unwrap_or_default().to_string();
            NOT_FOUND_HTML.render(&NotFoundVars { path }).into_bytes()
        }
    };

    let body = maybe_inject_livereload(body, HTML, reload_port);
    send_body(request, 404, HTML, body)
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with livereload.js from memory.
pub fn respond_livereload_js(request: Request, reload_port: u16) -> Result<()> {
    use crate::embed::serve::{LIVERELOAD_JS, LivereloadVars};

    if is_head_request(&request) {
        return send_head(request, 200, JAVASCRIPT);
    }

    let body = LIVERELOAD_JS.render(&LivereloadVars { reload_port });
    send_body(request, 200, JAVASCRIPT, body.into_bytes())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header {key}: {value}"))
}

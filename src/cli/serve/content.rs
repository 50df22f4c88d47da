//! Live reload script injection.

use crate::embed::serve::LIVERELOAD_PATH;

/// Inject the reload script if the body is HTML and live reload is running.
pub fn maybe_inject_livereload(
    body: Vec<u8>,
    content_type: &str,
    reload_port: Option<u16>,
) -> Vec<u8> {
    match (crate::utils::mime::is_html(content_type), reload_port) {
        (true, Some(_)) => inject_livereload_script(&body),
        _ => body,
    }
}

/// Inject the script tag before the last `</body>`
fn inject_livereload_script(content: &[u8]) -> Vec<u8> {
    let script = format!(r#"<script src="{LIVERELOAD_PATH}"></script>"#);
    let script_bytes = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script_bytes.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script_bytes);
    result.extend_from_slice(&content[pos..]);
    result
}

//! URL to filesystem path resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve URL to a file under `serve_root`, handling index.html for directories
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let local = serve_root.join(&clean);

    // Symlinks may still point outside the root.
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Strip the query string, decode, trim slashes
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("public/css")).unwrap();
        fs::create_dir_all(temp.path().join("public/blog")).unwrap();
        fs::write(temp.path().join("public/index.html"), "home").unwrap();
        fs::write(temp.path().join("public/blog/index.html"), "blog").unwrap();
        fs::write(temp.path().join("public/css/site styles.css"), "").unwrap();
        fs::write(temp.path().join("secret.txt"), "no").unwrap();
        temp
    }

    #[test]
    fn test_resolves_files_and_indexes() {
        let temp = site();
        let root = temp.path().join("public");

        let index = resolve_path("/", &root).unwrap();
        assert!(index.ends_with("public/index.html"));

        let blog = resolve_path("/blog/?page=2", &root).unwrap();
        assert!(blog.ends_with("blog/index.html"));

        let css = resolve_path("/css/site%20styles.css", &root).unwrap();
        assert!(css.ends_with("css/site styles.css"));

        assert!(resolve_path("/missing.html", &root).is_none());
        assert!(resolve_path("/css", &root).is_none());
    }

    #[test]
    fn test_rejects_traversal() {
        let temp = site();
        let root = temp.path().join("public");

        assert!(resolve_path("/../secret.txt", &root).is_none());
        assert!(resolve_path("/%2e%2e/secret.txt", &root).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let temp = site();
        let root = temp.path().join("public");
        std::os::unix::fs::symlink(temp.path().join("secret.txt"), root.join("link.txt")).unwrap();

        assert!(resolve_path("/link.txt", &root).is_none());
    }
}

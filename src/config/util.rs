//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Environment variable that toggles live reload.
pub const LIVE_RELOAD_ENV: &str = "LIVE_RELOAD_ENABLED";

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/site/web/templates/  ← cwd
/// /home/user/site/kittens.toml    ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(&cwd, config_name)
}

fn find_config_file_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Parse a boolean the way `LIVE_RELOAD_ENABLED` has always been read.
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`;
/// anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Read the live-reload flag from the environment.
///
/// `None` when the variable is unset; an unparsable value means `false`.
pub fn live_reload_from_env() -> Option<bool> {
    let value = std::env::var(LIVE_RELOAD_ENV).ok()?;
    Some(parse_bool(value.trim()).unwrap_or(false))
}

/// Expand `~` and join relative paths onto `root`.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_relative() {
        root.join(path)
    } else {
        path
    }
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bool_spellings() {
        for s in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("tRuE"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_find_config_file_walks_upward() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("web/templates");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("kittens.toml"), "").unwrap();

        let found = find_config_file_from(&nested, Path::new("kittens.toml")).unwrap();
        assert_eq!(found, temp.path().join("kittens.toml"));
    }

    #[test]
    fn test_find_config_file_missing() {
        let temp = TempDir::new().unwrap();
        assert!(find_config_file_from(temp.path(), Path::new("no-such-kittens.toml")).is_none());
    }

    #[test]
    fn test_resolve_under() {
        let root = Path::new("/site");
        assert_eq!(resolve_under(root, Path::new("web")), PathBuf::from("/site/web"));
        assert_eq!(resolve_under(root, Path::new("/abs")), PathBuf::from("/abs"));
    }
}

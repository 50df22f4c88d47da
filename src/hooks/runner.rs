//! External build execution.
//!
//! Runs the configured `[build] command` in the project root, with
//! `$KITTENS_*` variables substituted in its arguments and exported in its
//! environment.

use std::path::Path;
use std::process::Stdio;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::BuildConfig;

/// Why a build did not succeed
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}{}", stderr_suffix(.stderr))]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{program}` cancelled")]
    Cancelled { program: String },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

// ============================================================================
// Environment Variables
// ============================================================================

/// Build `$KITTENS_*` variables for command execution
pub fn build_vars(root: &Path, mode: &str) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert("KITTENS_ROOT".into(), root.display().to_string());
    vars.insert("KITTENS_MODE".into(), mode.into());
    vars
}

/// Resolve `$KITTENS_*` variables in command arguments
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                result = result.replace(&format!("${}", key), value);
            }
            result
        })
        .collect()
}

// ============================================================================
// Execution
// ============================================================================

/// Run the build once, killing it if `token` is cancelled first.
///
/// `mode` is exported as `$KITTENS_MODE` (`serve` or `build`).
pub async fn run_build(
    build: &BuildConfig,
    root: &Path,
    mode: &str,
    token: &CancellationToken,
) -> Result<(), BuildError> {
    let vars = build_vars(root, mode);
    let resolved = resolve_args(&build.command, &vars);
    let Some((program, args)) = resolved.split_first() else {
        return Ok(());
    };

    if !build.quiet {
        crate::log!("build"; "`{}` running", build.display_name());
    }

    let stdout = if build.quiet {
        Stdio::null()
    } else {
        Stdio::inherit()
    };

    let child = Command::new(program)
        .args(args)
        .current_dir(root)
        .envs(&vars)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BuildError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the future drops the child, which kills it.
    let output = tokio::select! {
        biased;
        _ = token.cancelled() => {
            return Err(BuildError::Cancelled { program: program.clone() });
        }
        output = child.wait_with_output() => output,
    };

    let output = output.map_err(|source| BuildError::Spawn {
        program: program.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(BuildError::Exit {
            program: program.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

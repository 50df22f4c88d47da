//! `kittens build` - run the external asset build once.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::{
    config::SiteConfig,
    core::register_shutdown_token,
    hooks::{BuildError, run_build},
    log,
};

/// Run the configured build in the foreground.
///
/// A disabled build is reported and treated as success.
pub fn build_once(config: &SiteConfig) -> Result<()> {
    if !config.build.is_active() {
        log!("build"; "build is disabled, nothing to do");
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let token = CancellationToken::new();
    register_shutdown_token(token.clone());

    log!("build"; "running {}", config.build.display_name());
    match rt.block_on(run_build(&config.build, config.get_root(), "build", &token)) {
        Ok(()) => {
            log!("build"; "done");
            Ok(())
        }
        Err(BuildError::Cancelled { .. }) => {
            log!("build"; "cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("build failed"),
    }
}

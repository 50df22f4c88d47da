//! kittens - personal website dev server with live reload.

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod hooks;
mod logger;
mod reload;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{SiteConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    // `.env` may set LIVE_RELOAD_ENABLED; it must be loaded before the config
    if let Err(e) = dotenvy::dotenv() {
        log!("config"; "no .env loaded: {}", e);
    }

    let config = init_config(SiteConfig::load(&cli)?);

    match &cli.command {
        Commands::Build { .. } => cli::build::build_once(&config),
        Commands::Serve { .. } => cli::serve::serve_site(),
    }
}

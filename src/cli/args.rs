//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Personal website dev server with live reload
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: kittens.toml)
    #[arg(short = 'C', long, default_value = "kittens.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the external asset build once
    #[command(visible_alias = "b")]
    Build {
        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Start development server with live reload
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number for the site
        #[arg(short, long)]
        port: Option<u16>,

        /// Port number for the live-reload WebSocket endpoint
        #[arg(short = 'r', long)]
        reload_port: Option<u16>,

        /// Enable file watching and browser live reload
        #[arg(short = 'l', long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        live_reload: Option<bool>,

        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },
}

impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }

    pub const fn verbose(&self) -> bool {
        match self.command {
            Commands::Build { verbose } | Commands::Serve { verbose, .. } => verbose,
        }
    }
}

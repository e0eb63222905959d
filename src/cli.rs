//! Command-line interface for dadbot.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DadBot - play chess against an engine while DadBot comments
#[derive(Parser, Debug)]
#[command(name = "dadbot")]
#[command(about = "Chess against a UCI engine with LLM commentary", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "dadbot.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web UI
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Play one game in the terminal
    Play,
}

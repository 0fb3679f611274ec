//! Command-line interface for strictly_ultimate.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Ultimate - authoritative ultimate tic-tac-toe server
#[derive(Parser, Debug)]
#[command(name = "strictly_ultimate")]
#[command(about = "Ultimate tic-tac-toe server with matchmaking and a bot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },
}

//! # Scribe CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `stages` - Show the demo stages and the features each one unlocks
//! - `config` - Show the effective configuration (API key redacted)

mod commands;

use clap::{Parser, Subcommand};
use scribe::config::Config;
use scribe_core::ScribeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Scribe - staged AI blog-writing demo
///
/// Walks a blog post draft through five stages, unlocking one AI
/// capability per stage.
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "scribe.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides server.host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the demo stages
    Stages,

    /// Show the effective configuration
    Config,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ScribeError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            let mut config = Config::load(&cli.config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Stages) | None => cmd_stages(json_mode),
        Some(Commands::Config) => cmd_config(&Config::load(&cli.config)?, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================

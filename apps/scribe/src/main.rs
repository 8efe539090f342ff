//! # Scribe - Staged AI Blog Demo
//!
//! The main binary: an HTTP API over demo sessions plus a small CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! SCRIBE_OPENAI_API_KEY=sk-... scribe server --host 0.0.0.0 --port 8080
//!
//! # Inspect
//! scribe stages
//! scribe --config scribe.toml config
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SCRIBE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SCRIBE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribe=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Scribe startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗ ██████╗██████╗ ██╗██████╗ ███████╗
  ██╔════╝██╔════╝██╔══██╗██║██╔══██╗██╔════╝
  ███████╗██║     ██████╔╝██║██████╔╝█████╗
  ╚════██║██║     ██╔══██╗██║██╔══██╗██╔══╝
  ███████║╚██████╗██║  ██║██║██████╔╝███████╗
  ╚══════╝ ╚═════╝╚═╝  ╚═╝╚═╝╚═════╝ ╚══════╝

  Staged AI Blog Demo v{}

  Edit • Generate • Stream • Illustrate • Narrate
"#,
        env!("CARGO_PKG_VERSION")
    );
}

//! # atomlens - extension bridge
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  apps/atomlens (THE BINARY)                  │
//! │                                                              │
//! │  ┌──────────┐   ┌──────────────┐   ┌─────────────────────┐   │
//! │  │   CLI    │   │   HTTP API   │   │  GraphQL index      │   │
//! │  │  (clap)  │   │ (axum + SSE) │   │  client (reqwest)   │   │
//! │  └────┬─────┘   └──────┬───────┘   └──────────┬──────────┘   │
//! │       │                │                      │              │
//! │       └────────────────┼──────────────────────┘              │
//! │                        ▼                                     │
//! │                ┌───────────────┐                             │
//! │                │ atomlens-core │                             │
//! │                │  (THE LOGIC)  │                             │
//! │                └───────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Write a config and start the bridge
//! atomlens init
//! atomlens server --port 8787
//!
//! # One-off lookups
//! atomlens search "x.com:alice"
//! atomlens suggest --anchor 0xabc --target-slot predicate
//! ```

use atomlens::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // ATOMLENS_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ATOMLENS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "atomlens=debug,atomlens_core=debug,tower_http=debug"
    } else {
        "atomlens=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

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

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the atomlens startup banner.
fn print_banner() {
    println!(
        r#"
   __ _| |_ ___  _ __ ___ | | ___ _ __  ___
  / _` | __/ _ \| '_ ` _ \| |/ _ \ '_ \/ __|
 | (_| | || (_) | | | | | | |  __/ | | \__ \
  \__,_|\__\___/|_| |_| |_|_|\___|_| |_|___/

  atomlens bridge v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

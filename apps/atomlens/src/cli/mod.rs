//! # atomlens CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the extension bridge
//! - `status` - Show configuration and persisted tab queues
//! - `search` - Search the atom index by label
//! - `suggest` - Rank candidates for one slot around an anchor atom
//! - `frequent` - Most frequent atoms for a slot
//! - `queue` - Show a tab's persisted queue
//! - `prune` - Delete persisted queues of tabs that are no longer open
//! - `init` - Write a default configuration file

mod commands;

use crate::config::Config;
use crate::error::AppError;
use atomlens_core::Slot;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// atomlens - on-chain atom lookups for the browser
///
/// Bridges the browser extension to the remote atom index: tab-scoped
/// query queues, a coalescing search cache and relationship suggestions.
#[derive(Parser, Debug)]
#[command(name = "atomlens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./atomlens.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the queue database, overriding the configuration
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

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
    /// Start the HTTP bridge
    Server {
        /// Host to bind to, overriding the configuration
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and persisted tab queues
    Status,

    /// Search the atom index by label
    Search {
        /// Label to look up
        label: String,

        /// Substring search instead of exact label match
        #[arg(long)]
        partial: bool,
    },

    /// Rank candidates for one slot of a relationship around an anchor atom
    Suggest {
        /// Term id of the anchor atom
        #[arg(short, long)]
        anchor: String,

        /// Label of the anchor atom
        #[arg(short, long, default_value = "")]
        label: String,

        /// Raw data of the anchor atom (used for pattern fallback)
        #[arg(short = 'd', long, default_value = "")]
        data: String,

        /// Slot the anchor occupies (subject, predicate, object)
        #[arg(long, default_value = "subject")]
        anchor_slot: Slot,

        /// Slot to suggest candidates for
        #[arg(short, long, default_value = "predicate")]
        target_slot: Slot,

        /// Case-insensitive filter on candidate labels
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Most frequent atoms for a slot across recent relationships
    Frequent {
        /// Slot to rank (subject, predicate, object)
        #[arg(short, long)]
        slot: Slot,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show a tab's persisted queue
    Queue {
        /// Tab id
        #[arg(short, long)]
        tab: u64,
    },

    /// Delete persisted queues of tabs that are no longer open
    Prune {
        /// Ids of the tabs still open (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        live: Vec<u64>,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    // `init` must work without a valid configuration.
    if let Some(Commands::Init { output, force }) = &cli.command {
        return cmd_init(output, *force);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.database {
        config.queue.database = db;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Search { label, partial }) => {
            cmd_search(&config, json_mode, &label, partial).await
        }
        Some(Commands::Suggest {
            anchor,
            label,
            data,
            anchor_slot,
            target_slot,
            search,
        }) => {
            let anchor = atomlens_core::AtomSummary::new(anchor, label, data);
            cmd_suggest(
                &config,
                json_mode,
                &anchor,
                anchor_slot,
                target_slot,
                search.as_deref(),
            )
            .await
        }
        Some(Commands::Frequent { slot, limit }) => {
            cmd_frequent(&config, json_mode, slot, limit).await
        }
        Some(Commands::Queue { tab }) => cmd_queue(&config, json_mode, tab),
        Some(Commands::Prune { live }) => cmd_prune(&config, json_mode, &live),
        Some(Commands::Status) | Some(Commands::Init { .. }) | None => {
            cmd_status(&config, json_mode)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn suggest_defaults_to_subject_predicate() {
        let cli = Cli::try_parse_from(["atomlens", "suggest", "--anchor", "0x01"]).unwrap();
        match cli.command {
            Some(Commands::Suggest {
                anchor,
                anchor_slot,
                target_slot,
                search,
                ..
            }) => {
                assert_eq!(anchor, "0x01");
                assert_eq!(anchor_slot, Slot::Subject);
                assert_eq!(target_slot, Slot::Predicate);
                assert!(search.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let result = Cli::try_parse_from(["atomlens", "frequent", "--slot", "verb"]);
        assert!(result.is_err());
    }

    #[test]
    fn prune_splits_live_ids() {
        let cli = Cli::try_parse_from(["atomlens", "-D", "q.db", "prune", "--live", "3,7,11"])
            .unwrap();
        assert_eq!(cli.database, Some(PathBuf::from("q.db")));
        match cli.command {
            Some(Commands::Prune { live }) => assert_eq!(live, vec![3, 7, 11]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

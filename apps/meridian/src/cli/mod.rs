//! # Meridian CLI Module
//!
//! ## Available Commands
//!
//! - `scan` - Run one paginated bulk read against a store fixture
//! - `rank` - Order a list of source series
//! - `score` - Resolve the preference score of one provenance
//! - `triples` - Show an entity's relations after fan-out capping
//! - `token` - Decode a pagination token

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use meridian_core::MeridianError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Meridian - ranked, resumable bulk reads over a partitioned statistical
/// knowledge graph.
#[derive(Parser, Debug)]
#[command(name = "meridian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: $MERIDIAN_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one page of a bulk read
    Scan {
        /// Store fixture (JSON)
        #[arg(short, long)]
        store: PathBuf,

        /// Entity to read (repeatable, or comma-separated)
        #[arg(short, long = "entity", required = true, value_delimiter = ',')]
        entities: Vec<String>,

        /// Items per entity (default: scan.page_budget)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Continuation token from a previous page
        #[arg(short, long)]
        token: Option<String>,

        /// Keep reading until every entity is exhausted
        #[arg(long)]
        all: bool,
    },

    /// Order source series by preference
    Rank {
        /// JSON array of series
        #[arg(short, long)]
        input: PathBuf,

        /// Cohort order (ignores dates and lengths)
        #[arg(long)]
        cohort: bool,
    },

    /// Resolve the score of one provenance
    Score {
        /// Import name
        #[arg(long)]
        import: String,

        /// Measurement method
        #[arg(long, default_value = "")]
        method: String,

        /// Observation period
        #[arg(long, default_value = "")]
        period: String,
    },

    /// Show relations of an entity after fan-out capping
    Triples {
        /// Store fixture (JSON)
        #[arg(short, long)]
        store: PathBuf,

        /// Entity whose relations to show
        #[arg(short, long)]
        entity: String,

        /// Per-bucket cap (default: filter.triple_limit; 0 = unbounded)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Decode a pagination token
    Token {
        /// Wire token
        token: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MeridianError> {
    let config = Config::resolve(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Scan {
            store,
            entities,
            budget,
            token,
            all,
        } => {
            let options = ScanOptions {
                entities,
                budget: budget.unwrap_or(config.scan.page_budget),
                token,
                all,
            };
            cmd_scan(&config, &store, json_mode, options).await
        }
        Commands::Rank { input, cohort } => cmd_rank(&config, &input, json_mode, cohort),
        Commands::Score {
            import,
            method,
            period,
        } => cmd_score(&config, json_mode, &import, &method, &period),
        Commands::Triples {
            store,
            entity,
            limit,
        } => cmd_triples(&config, &store, json_mode, &entity, limit),
        Commands::Token { token } => cmd_token(json_mode, &token),
    }
}

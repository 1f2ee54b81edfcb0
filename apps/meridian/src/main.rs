//! # Meridian - Bulk Query Driver
//!
//! The main binary for the Meridian statistical knowledge graph core.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                apps/meridian (THE BINARY)                 │
//! │                                                           │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐   │
//! │  │    CLI      │    │ MergeScanner │    │ PageSource  │   │
//! │  │   (clap)    │───▶│   (tokio)    │───▶│   (store)   │   │
//! │  └─────────────┘    └──────┬───────┘    └─────────────┘   │
//! │                            ▼                              │
//! │                    ┌───────────────┐                      │
//! │                    │ meridian-core │                      │
//! │                    │  (THE LOGIC)  │                      │
//! │                    └───────────────┘                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! meridian scan -s store.json -e geoId/06 -e country/USA --budget 50
//! meridian scan -s store.json -e geoId/06 --token <TOKEN>
//! meridian rank -i series.json
//! meridian score --import CensusPEP --method CensusPEPSurvey
//! meridian triples -s store.json -e geoId/06 --limit 10
//! meridian token <TOKEN>
//! ```

use clap::Parser;
use meridian::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MERIDIAN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MERIDIAN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meridian=info".into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
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

/// Print the Meridian startup banner.
fn print_banner() {
    eprintln!(
        r#"
  Meridian v{}
  Ranked • Resumable • Bounded
"#,
        env!("CARGO_PKG_VERSION")
    );
}

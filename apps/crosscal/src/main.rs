//! # Crosscal - cross-calibration stage runner
//!
//! The binary for the cross-calibration stage of the Apertif reduction.
//!
//! ## Usage
//!
//! ```bash
//! # Full sequence with a user configuration
//! crosscal -c obs.toml go
//!
//! # See which MIRIAD tasks would run
//! crosscal -c obs.toml --dry-run go
//!
//! # Individual steps
//! crosscal -c obs.toml bandpass
//! crosscal -c obs.toml transfer
//!
//! # Inspect and clean up
//! crosscal -c obs.toml show --all
//! crosscal -c obs.toml reset --yes
//! ```

use clap::Parser;
use crosscal::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing. CROSSCAL_LOG_FORMAT=json selects machine-parseable output.
    let log_format = std::env::var("CROSSCAL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("crosscal={0},crosscal_core={0}", default_level).into()
    });

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

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

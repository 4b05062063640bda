//! # Crosscal CLI Module
//!
//! This module implements the CLI interface for the cross-calibration stage.
//!
//! ## Available Commands
//!
//! - `go` - Run bandpass, polarisation and transfer (default)
//! - `bandpass` - Solve for the bandpass on the flux calibrator
//! - `polarisation` - Solve for leakage and angle on the polarised calibrator
//! - `transfer` - Copy calibrator solutions to every beam's target
//! - `show` - Print the current settings
//! - `reset` - Delete everything this stage produced

mod commands;

use clap::{Parser, Subcommand};
use crosscal_core::{CalibrationEngine, CrosscalError, DryRunEngine, MiriadEngine, StageController};
use std::path::PathBuf;
use thiserror::Error;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Crosscal - cross-calibration stage runner
///
/// Derives bandpass and polarisation solutions from the calibrators and
/// transfers them to the target data of every beam, using MIRIAD tasks.
#[derive(Parser, Debug)]
#[command(name = "crosscal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML); built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the MIRIAD task executables (default: search PATH)
    #[arg(long, global = true)]
    pub miriad_bin: Option<PathBuf>,

    /// Log the MIRIAD tasks that would run instead of running them
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the full cross-calibration sequence
    Go,

    /// Solve for the bandpass on the flux calibrator
    Bandpass,

    /// Solve for polarisation leakage and angle
    Polarisation,

    /// Copy calibrator solutions to the target data of every beam
    Transfer,

    /// Print the current settings
    Show {
        /// Show every section, not only CROSSCAL
        #[arg(short, long)]
        all: bool,
    },

    /// Delete all data in the cross-calibration directory
    Reset {
        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The stage itself failed.
    #[error(transparent)]
    Stage(#[from] CrosscalError),

    /// `reset` was requested without confirmation.
    #[error("Refusing to delete cross-calibration data without --yes")]
    ResetNotConfirmed,
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Stage(_) => 1,
            Self::ResetNotConfirmed => 2,
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CliError> {
    let engine: Box<dyn CalibrationEngine> = if cli.dry_run {
        Box::new(DryRunEngine::new())
    } else {
        match cli.miriad_bin {
            Some(dir) => Box::new(MiriadEngine::with_bin_dir(dir)),
            None => Box::new(MiriadEngine::new()),
        }
    };

    let mut controller = StageController::from_file(cli.config.as_deref(), engine)?;

    match cli.command.unwrap_or(Commands::Go) {
        Commands::Go => cmd_go(&mut controller),
        Commands::Bandpass => cmd_bandpass(&mut controller),
        Commands::Polarisation => cmd_polarisation(&mut controller),
        Commands::Transfer => cmd_transfer(&mut controller),
        Commands::Show { all } => cmd_show(&controller, all),
        Commands::Reset { yes } => cmd_reset(&mut controller, yes),
    }
}

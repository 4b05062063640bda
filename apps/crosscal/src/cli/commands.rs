//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CliError;
use crosscal_core::{CalibrationEngine, CrosscalError, SolutionSource, StageController};
use std::io::Write;

// =============================================================================
// STAGE COMMANDS
// =============================================================================

/// Run the full sequence.
pub fn cmd_go<E: CalibrationEngine>(controller: &mut StageController<E>) -> Result<(), CliError> {
    controller.go()?;
    Ok(())
}

/// Run the bandpass step only.
pub fn cmd_bandpass<E: CalibrationEngine>(
    controller: &mut StageController<E>,
) -> Result<(), CliError> {
    controller.bandpass()?;
    Ok(())
}

/// Run the polarisation step only.
pub fn cmd_polarisation<E: CalibrationEngine>(
    controller: &mut StageController<E>,
) -> Result<(), CliError> {
    controller.polarisation()?;
    Ok(())
}

/// Run the transfer step only and summarise what was copied.
pub fn cmd_transfer<E: CalibrationEngine>(
    controller: &mut StageController<E>,
) -> Result<(), CliError> {
    let Some(report) = controller.transfer_to_target()? else {
        return Ok(());
    };

    let source = match report.source {
        SolutionSource::PolarisationCalibrator => "polarised calibrator",
        SolutionSource::FluxCalibrator => "flux calibrator",
    };

    println!("Solutions transferred from the {}", source);
    println!("  Copied:  {}", report.copied.len());
    println!("  Skipped: {}", report.skipped.len());
    for target in &report.copied {
        println!("    {}", target.display());
    }

    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Print the current settings to stdout.
pub fn cmd_show<E: CalibrationEngine>(
    controller: &StageController<E>,
    all: bool,
) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    controller.show(all, &mut out)?;
    out.flush()
        .map_err(|e| CrosscalError::io("flush settings", e))?;
    Ok(())
}

// =============================================================================
// RESET COMMAND
// =============================================================================

/// Delete the stage's data, but only when confirmed.
pub fn cmd_reset<E: CalibrationEngine>(
    controller: &mut StageController<E>,
    confirmed: bool,
) -> Result<(), CliError> {
    if !confirmed {
        eprintln!(
            "This deletes everything in {}. Re-run with --yes to confirm.",
            controller.crosscal_dir().display()
        );
        return Err(CliError::ResetNotConfirmed);
    }

    controller.reset()?;
    println!("Cleared {}", controller.crosscal_dir().display());
    Ok(())
}

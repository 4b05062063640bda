//! # Core Type Definitions
//!
//! This module contains the shared types of the cross-calibration stage:
//! - Solution artifact names (`SolutionTable`, `VISDATA_MARKER`)
//! - Resolved dataset identifiers (`DatasetNames`)
//! - Error types (`ConfigError`, `EngineError`, `CrosscalError`)
//!
//! ## Decision Signal
//!
//! The engine writes its solutions as plain files inside each dataset
//! directory. Their presence on disk is the only record of what has been
//! solved; nothing is tracked in memory between steps.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// SOLUTION ARTIFACTS
// =============================================================================

/// Name of the file that marks a directory as holding visibility data.
pub const VISDATA_MARKER: &str = "visdata";

/// A calibration table the engine writes into a dataset directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SolutionTable {
    /// Per-channel bandpass solution.
    Bandpass,
    /// Antenna gain solution.
    Gains,
    /// Polarisation leakage (and XY phase) solution.
    Leakage,
}

impl SolutionTable {
    /// Full solution set produced by a completed polarisation calibration.
    pub const POLARISED: [SolutionTable; 3] = [Self::Bandpass, Self::Gains, Self::Leakage];

    /// Solution set produced by a completed bandpass calibration.
    pub const UNPOLARISED: [SolutionTable; 2] = [Self::Bandpass, Self::Gains];

    /// File name of the table inside a dataset directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Bandpass => "bandpass",
            Self::Gains => "gains",
            Self::Leakage => "leakage",
        }
    }

    /// Check whether this table exists in `dataset_dir`.
    ///
    /// Any error while probing counts as "not present".
    #[must_use]
    pub fn present_in(self, dataset_dir: &Path) -> bool {
        dataset_dir.join(self.file_name()).is_file()
    }

    /// Check whether every table in `tables` exists in `dataset_dir`.
    #[must_use]
    pub fn all_present_in(tables: &[SolutionTable], dataset_dir: &Path) -> bool {
        tables.iter().all(|t| t.present_in(dataset_dir))
    }
}

impl fmt::Display for SolutionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

// =============================================================================
// DATASET NAMES
// =============================================================================

/// Dataset identifiers in the form the calibration engine expects.
///
/// Produced by a [`crate::layout::DatasetNaming`] resolver from the raw
/// configured names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetNames {
    /// Flux calibrator dataset.
    pub fluxcal: String,
    /// Polarisation calibrator dataset.
    pub polcal: String,
    /// Target field dataset.
    pub target: String,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration text is not valid TOML, or a value has the wrong type.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The current settings could not be rendered back to TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration is well-formed but not acceptable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors raised by the external calibration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The task executable could not be started.
    #[error("Failed to start {task}: {source}")]
    Spawn {
        task: String,
        #[source]
        source: io::Error,
    },

    /// The task ran and exited unsuccessfully.
    #[error("{task} failed with exit code {code}: {stderr}")]
    Failed {
        task: String,
        code: i32,
        stderr: String,
    },
}

/// Errors that abort a cross-calibration step.
///
/// The library never terminates the process; the caller decides what an
/// error means for the exit status.
#[derive(Debug, Error)]
pub enum CrosscalError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An engine invocation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A filesystem operation failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Neither calibrator holds a usable solution set to transfer.
    #[error("No calibrator solutions found in {}", .searched.display())]
    NoSolutions { searched: PathBuf },
}

impl CrosscalError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for cross-calibration operations.
pub type CrosscalResult<T> = Result<T, CrosscalError>;

// =============================================================================
// TESTS
// =============================================================================

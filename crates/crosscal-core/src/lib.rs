//! # crosscal-core
//!
//! The cross-calibration stage of a radio-interferometry reduction pipeline.
//!
//! This crate decides which external calibration tasks run, in what order,
//! on which named datasets. The calibration numerics themselves (bandpass
//! fitting, gain and leakage solving) are done by the MIRIAD tasks `mfcal`,
//! `gpcopy` and `gpcal`, invoked through the [`CalibrationEngine`] seam.
//!
//! ## Flow
//!
//! ```text
//! Config (TOML, layered over built-in defaults)
//!    │
//!    ▼
//! StageController ── DirectoryPolicy ──► <basedir>/<beam>/<crosscalsubdir>
//!    │            └─ DatasetNaming   ──► 3C147.MS → 3C147.mir
//!    │
//!    ├─ bandpass            ─► mfcal
//!    ├─ polarisation        ─► gpcopy | mfcal, then gpcal
//!    └─ transfer_to_target  ─► gpcopy per beam with visdata
//! ```
//!
//! ## Architectural Constraints
//!
//! - Synchronous: each engine call and filesystem operation runs to completion
//! - Explicit paths: the process working directory is never changed
//! - No solution state in memory: solution tables on disk are the only signal
//! - No process exits: fatal conditions are returned as [`CrosscalError`]

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod controller;
pub mod engine;
pub mod layout;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use config::{Config, CrosscalSettings, InitialSettings};
pub use controller::{SolutionSource, StageController, TransferReport};
pub use engine::{CalibrationEngine, DryRunEngine, Invocation, MiriadEngine, Task};
pub use layout::{ApercalLayout, DatasetNaming, DirectoryPolicy, MiriadNaming};
pub use types::{
    ConfigError, CrosscalError, CrosscalResult, DatasetNames, EngineError, SolutionTable,
    VISDATA_MARKER,
};

//! # Configuration
//!
//! Typed configuration for the cross-calibration stage.
//!
//! ## Layering
//!
//! A built-in default file (`default.toml`) is compiled into the crate. A
//! user file only needs the keys it changes: its values replace the defaults
//! key by key within each section. The merged table is then deserialized
//! into [`Config`], which rejects unknown sections, unknown keys and values
//! of the wrong type.
//!
//! ## Sections
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `INITIAL` | Directory layout and dataset names shared by all stages |
//! | `CROSSCAL` | Switches for the individual cross-calibration steps |

use crate::types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use toml::{Table, Value};

/// Built-in default configuration text.
pub const DEFAULT_CONFIG: &str = include_str!("../../default.toml");

/// Name of the section that belongs to this stage.
pub const CROSSCAL_SECTION: &str = "CROSSCAL";

// =============================================================================
// SETTINGS
// =============================================================================

/// Root configuration: one field per section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Layout and dataset names.
    #[serde(rename = "INITIAL")]
    pub initial: InitialSettings,

    /// Cross-calibration step switches.
    #[serde(rename = "CROSSCAL")]
    pub crosscal: CrosscalSettings,
}

/// Directory layout and dataset names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialSettings {
    /// Installation root of the pipeline.
    pub apercaldir: String,
    /// Directory that holds one subdirectory per beam.
    pub basedir: String,
    /// Beam this run works on.
    pub beam: String,
    /// Flux calibrator dataset name.
    pub fluxcal: String,
    /// Polarisation calibrator dataset name.
    pub polcal: String,
    /// Target field dataset name.
    pub target: String,
    /// Per-beam subdirectory of this stage.
    pub crosscalsubdir: String,
}

/// Switches for the cross-calibration steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrosscalSettings {
    /// Solve for the bandpass on the flux calibrator.
    pub crosscal_bandpass: bool,
    /// Also solve for antenna delays during the bandpass solve.
    pub crosscal_delay: bool,
    /// Solve for polarisation leakage and angle on the polarised calibrator.
    pub crosscal_polarisation: bool,
    /// Copy the calibrator solutions to the target datasets of every beam.
    pub crosscal_transfer_to_target: bool,
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Configuration with every option at its built-in default.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_table(default_table()?)
    }

    /// Parse `text` as a user file layered over the built-in defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let user: Table = text.parse()?;
        let mut merged = default_table()?;
        overlay(&mut merged, user)?;
        Self::from_table(merged)
    }

    /// Load configuration from `path`, or the defaults when `path` is `None`.
    ///
    /// An unreadable file is an error; it never falls back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_toml_str(&text)?;
                tracing::info!(
                    "### Configuration file {} successfully read! ###",
                    path.display()
                );
                Ok(config)
            }
            None => {
                let config = Self::defaults()?;
                tracing::info!("### No configuration file given! Using default values! ###");
                Ok(config)
            }
        }
    }

    /// Current settings as a `section -> option -> value` table.
    pub fn to_table(&self) -> Result<Table, ConfigError> {
        match Value::try_from(self)? {
            Value::Table(table) => Ok(table),
            other => Err(ConfigError::Invalid(format!(
                "settings rendered as {} instead of a table",
                other.type_str()
            ))),
        }
    }

    fn from_table(table: Table) -> Result<Self, ConfigError> {
        Ok(Value::Table(table).try_into::<Self>()?)
    }
}

/// The built-in defaults as a raw table, in file order.
pub fn default_table() -> Result<Table, ConfigError> {
    Ok(DEFAULT_CONFIG.parse()?)
}

/// Replace values in `base` with those in `user`, section by section.
///
/// Top-level entries of `user` must be sections. Keys are not checked here;
/// typed deserialization rejects the unknown ones.
fn overlay(base: &mut Table, user: Table) -> Result<(), ConfigError> {
    for (section, value) in user {
        let Value::Table(options) = value else {
            return Err(ConfigError::Invalid(format!(
                "top-level key '{}' is not a section",
                section
            )));
        };

        match base.get_mut(&section) {
            Some(Value::Table(existing)) => existing.extend(options),
            _ => {
                base.insert(section, Value::Table(options));
            }
        }
    }
    Ok(())
}

/// Render a value for human-readable listings.
///
/// Strings are shown without quotes; everything else in TOML notation.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Directory Layout and Dataset Naming
//!
//! The controller never changes the process working directory. Instead the
//! two resolvers here turn configuration into explicit paths and names, and
//! every step passes those along to the engine and the filesystem calls.
//!
//! ## On-disk layout
//!
//! ```text
//! <basedir>/
//! ├── 00/                      <- beam directory
//! │   └── crosscal/            <- crosscal_dir for beam 00
//! │       ├── 3C147.mir/       <- flux calibrator (bandpass, gains)
//! │       ├── 3C138.mir/       <- polarisation calibrator (+ leakage)
//! │       └── target.mir/      <- target field (visdata)
//! ├── 01/
//! │   └── crosscal/
//! │       └── target.mir/
//! └── ...
//! ```

mod director;

pub use director::{enter, list_beams, remove_contents};

use crate::config::Config;
use crate::types::DatasetNames;
use std::path::{Component, Path, PathBuf};

/// Native dataset extension of the calibration engine.
pub const MIRIAD_EXTENSION: &str = "mir";

// =============================================================================
// DIRECTORY POLICY
// =============================================================================

/// Resolves where the stage works on disk.
pub trait DirectoryPolicy {
    /// Working directory of the cross-calibration stage for the current beam.
    fn crosscal_dir(&self, config: &Config) -> PathBuf;

    /// Directory whose entries are the beam datasets receiving solutions.
    fn beams_root(&self, config: &Config) -> PathBuf;
}

/// `<basedir>/<beam>/<crosscalsubdir>`, with beams as siblings under `basedir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApercalLayout;

impl DirectoryPolicy for ApercalLayout {
    fn crosscal_dir(&self, config: &Config) -> PathBuf {
        let initial = &config.initial;
        Path::new(&initial.basedir)
            .join(&initial.beam)
            .join(&initial.crosscalsubdir)
    }

    fn beams_root(&self, config: &Config) -> PathBuf {
        normalize(&self.crosscal_dir(config).join("..").join(".."))
    }
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above the start of a relative path is kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

// =============================================================================
// DATASET NAMING
// =============================================================================

/// Turns configured dataset names into the names the engine works with.
pub trait DatasetNaming {
    /// Resolve the flux calibrator, polarisation calibrator and target names.
    fn resolve(&self, config: &Config) -> DatasetNames;
}

/// Measurement-set names become MIRIAD dataset names.
///
/// `3C147.MS` becomes `3C147.mir`; a bare name gets `.mir` appended.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiriadNaming;

impl MiriadNaming {
    /// Convert a single dataset name.
    #[must_use]
    pub fn to_miriad(name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }

        let path = Path::new(name);
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext == MIRIAD_EXTENSION => name.to_string(),
            Some(ext) if ext.eq_ignore_ascii_case("ms") => path
                .with_extension(MIRIAD_EXTENSION)
                .to_string_lossy()
                .into_owned(),
            _ => format!("{}.{}", name, MIRIAD_EXTENSION),
        }
    }
}

impl DatasetNaming for MiriadNaming {
    fn resolve(&self, config: &Config) -> DatasetNames {
        let initial = &config.initial;
        DatasetNames {
            fluxcal: Self::to_miriad(&initial.fluxcal),
            polcal: Self::to_miriad(&initial.polcal),
            target: Self::to_miriad(&initial.target),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

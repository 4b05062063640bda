//! # Cross-Calibration Stage
//!
//! The [`StageController`] decides which engine tasks run, in which order,
//! on which datasets. It owns no solution state: whether a step has been done
//! is read back from the solution tables on disk every time.
//!
//! ## Steps
//!
//! | Step | Switch | Engine tasks |
//! |------|--------|--------------|
//! | bandpass | `crosscal_bandpass` | `mfcal` on the flux calibrator |
//! | polarisation | `crosscal_polarisation` | `gpcopy` + `gpcal`, or `mfcal` + `gpcal` |
//! | transfer to target | `crosscal_transfer_to_target` | one `gpcopy` per beam with data |
//!
//! A disabled bandpass step is silent. The other two log a skip notice.

use crate::config::{CROSSCAL_SECTION, Config, default_table, display_value};
use crate::engine::{CalibrationEngine, Task};
use crate::layout::{
    ApercalLayout, DatasetNaming, DirectoryPolicy, MiriadNaming, enter, list_beams,
    remove_contents,
};
use crate::types::{
    CrosscalError, CrosscalResult, DatasetNames, SolutionTable, VISDATA_MARKER,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

// =============================================================================
// ENGINE PARAMETERS
// =============================================================================

/// Stokes combination used for the bandpass solve.
pub const BANDPASS_STOKES: &str = "ii";

/// Solution interval (minutes) of the bandpass solve.
pub const BANDPASS_INTERVAL: u32 = 1000;

/// `gpcopy` options when seeding the polarised calibrator from the flux calibrator.
pub const POLCAL_COPY_OPTIONS: &str = "nopol,relax";

/// `gpcal` options for the leakage and angle solve.
pub const LEAKAGE_OPTIONS: &str = "xyvary,linear";

/// `gpcopy` options when transferring to target datasets.
pub const TRANSFER_OPTIONS: &str = "relax";

// =============================================================================
// TRANSFER REPORT
// =============================================================================

/// Which calibrator the target solutions were copied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionSource {
    /// Bandpass, gains and leakage from the polarised calibrator.
    PolarisationCalibrator,
    /// Bandpass and gains only, from the flux calibrator.
    FluxCalibrator,
}

/// Outcome of a transfer to the beam datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Calibrator the solutions came from.
    pub source: SolutionSource,
    /// Target datasets that received a copy.
    pub copied: Vec<PathBuf>,
    /// Beam entries without target data.
    pub skipped: Vec<PathBuf>,
}

// =============================================================================
// STAGE CONTROLLER
// =============================================================================

/// Runs the cross-calibration stage for one beam.
pub struct StageController<E> {
    config: Config,
    /// Built-in defaults, kept for `show`.
    defaults: Table,
    engine: E,
    directories: Box<dyn DirectoryPolicy>,
    naming: Box<dyn DatasetNaming>,
    crosscal_dir: PathBuf,
    names: DatasetNames,
}

impl<E: CalibrationEngine> StageController<E> {
    /// Create a controller with the Apercal layout and MIRIAD dataset names.
    pub fn new(config: Config, engine: E) -> CrosscalResult<Self> {
        Self::with_helpers(
            config,
            engine,
            Box::new(ApercalLayout),
            Box::new(MiriadNaming),
        )
    }

    /// Load configuration from `path` (or the defaults) and create a controller.
    pub fn from_file(path: Option<&Path>, engine: E) -> CrosscalResult<Self> {
        Self::new(Config::load(path)?, engine)
    }

    /// Create a controller with custom directory and naming resolvers.
    pub fn with_helpers(
        config: Config,
        engine: E,
        directories: Box<dyn DirectoryPolicy>,
        naming: Box<dyn DatasetNaming>,
    ) -> CrosscalResult<Self> {
        let mut controller = Self {
            config,
            defaults: default_table()?,
            engine,
            directories,
            naming,
            crosscal_dir: PathBuf::new(),
            names: DatasetNames::default(),
        };
        controller.resolve();
        Ok(controller)
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine tasks are sent to.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Consume the controller and return its engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Working directory of this stage.
    pub fn crosscal_dir(&self) -> &Path {
        &self.crosscal_dir
    }

    /// Resolved dataset names.
    pub fn names(&self) -> &DatasetNames {
        &self.names
    }

    /// Re-run the directory and naming resolvers.
    fn resolve(&mut self) {
        self.crosscal_dir = self.directories.crosscal_dir(&self.config);
        self.names = self.naming.resolve(&self.config);
    }

    /// Resolve, then make sure the working directory exists.
    fn enter_workdir(&mut self) -> CrosscalResult<PathBuf> {
        self.resolve();
        Ok(enter(&self.crosscal_dir)?.to_path_buf())
    }

    // -------------------------------------------------------------------------
    // Full sequence
    // -------------------------------------------------------------------------

    /// Run bandpass, polarisation and transfer to target, in that order.
    ///
    /// The first failing step aborts the sequence.
    pub fn go(&mut self) -> CrosscalResult<()> {
        tracing::info!("########## Starting CROSS CALIBRATION ##########");
        self.bandpass()?;
        self.polarisation()?;
        self.transfer_to_target()?;
        tracing::info!("########## CROSS CALIBRATION done ##########");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Bandpass
    // -------------------------------------------------------------------------

    /// Solve for the bandpass on the flux calibrator.
    pub fn bandpass(&mut self) -> CrosscalResult<()> {
        if !self.config.crosscal.crosscal_bandpass {
            return Ok(());
        }

        let workdir = self.enter_workdir()?;
        tracing::info!("### Bandpass calibration on the flux calibrator data started ###");

        let mut mfcal = Task::new("mfcal")
            .param("vis", &self.names.fluxcal)
            .param("stokes", BANDPASS_STOKES);
        if self.config.crosscal.crosscal_delay {
            mfcal = mfcal.param("options", "delay");
        }
        let mfcal = mfcal.param("interval", BANDPASS_INTERVAL);
        self.engine.run(&mfcal, &workdir)?;

        tracing::info!("### Bandpass calibration on the flux calibrator data done ###");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Polarisation
    // -------------------------------------------------------------------------

    /// Solve for polarisation leakage and angle on the polarised calibrator.
    ///
    /// Reuses the flux calibrator bandpass when one exists on disk, otherwise
    /// derives a bandpass from the polarised calibrator first.
    pub fn polarisation(&mut self) -> CrosscalResult<()> {
        if !self.config.crosscal.crosscal_polarisation {
            tracing::info!("### No polarisation calibration done! ###");
            return Ok(());
        }

        let workdir = self.enter_workdir()?;
        tracing::info!("### Polarisation calibration on the polarised calibrator data started ###");

        let fluxcal_dir = workdir.join(&self.names.fluxcal);
        if SolutionTable::Bandpass.present_in(&fluxcal_dir) {
            tracing::info!("# Bandpass solutions in flux calibrator data found. Using them! #");
            let gpcopy = Task::new("gpcopy")
                .param("vis", &self.names.fluxcal)
                .param("out", &self.names.polcal)
                .param("mode", "copy")
                .param("options", POLCAL_COPY_OPTIONS);
            self.engine.run(&gpcopy, &workdir)?;
            tracing::info!(
                "# Bandpass from flux calibrator data copied to polarised calibrator data #"
            );
        } else {
            tracing::info!("# Bandpass solutions from flux calibrator not found #");
            tracing::info!("# Deriving bandpass from polarised calibrator using mfcal #");
            let mfcal = Task::new("mfcal").param("vis", &self.names.polcal);
            self.engine.run(&mfcal, &workdir)?;
            tracing::info!("# Bandpass solutions from polarised calibrator derived #");
            tracing::info!(
                "# Continuing with polarisation calibration (leakage, angle) from polarised calibrator data #"
            );
        }

        let gpcal = Task::new("gpcal")
            .param("vis", &self.names.polcal)
            .param("options", LEAKAGE_OPTIONS);
        self.engine.run(&gpcal, &workdir)?;
        tracing::info!("# Solved for polarisation leakage and angle on polarised calibrator #");

        tracing::info!("### Polarisation calibration on the polarised calibrator data done ###");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transfer to target
    // -------------------------------------------------------------------------

    /// Copy the best available calibrator solutions to every beam's target.
    ///
    /// Returns `None` when the step is switched off. Fails with
    /// [`CrosscalError::NoSolutions`] before touching any beam when neither
    /// calibrator has a complete solution set.
    pub fn transfer_to_target(&mut self) -> CrosscalResult<Option<TransferReport>> {
        if !self.config.crosscal.crosscal_transfer_to_target {
            tracing::info!("### No copying of calibrator solutions to target data done! ###");
            return Ok(None);
        }

        let workdir = self.enter_workdir()?;
        tracing::info!("### Copying calibrator solutions to target dataset ###");

        let source = self.select_source(&workdir)?;
        let vis = match source {
            SolutionSource::PolarisationCalibrator => self.names.polcal.clone(),
            SolutionSource::FluxCalibrator => self.names.fluxcal.clone(),
        };

        let root = self.directories.beams_root(&self.config);
        let root = root
            .canonicalize()
            .map_err(|e| CrosscalError::io(format!("resolve {}", root.display()), e))?;
        let beams = list_beams(&root)?;
        tracing::info!("# Copying calibrator solutions to {} beams! #", beams.len());

        let mut report = TransferReport {
            source,
            copied: Vec::new(),
            skipped: Vec::new(),
        };

        for (n, beam) in beams.into_iter().enumerate() {
            let target = beam
                .join(&self.config.initial.crosscalsubdir)
                .join(&self.names.target);

            if target.join(VISDATA_MARKER).is_file() {
                let gpcopy = Task::new("gpcopy")
                    .param("vis", &vis)
                    .param("out", target.display())
                    .param("options", TRANSFER_OPTIONS);
                self.engine.run(&gpcopy, &workdir)?;
                tracing::info!("# Calibrator solutions copied to beam {:02}! #", n);
                report.copied.push(target);
            } else {
                tracing::warn!("# Beam {:02} does not seem to contain data! #", n);
                report.skipped.push(beam);
            }
        }

        tracing::info!("### All solutions copied to target data set(s) ###");
        Ok(Some(report))
    }

    /// Pick the calibrator whose solutions get transferred.
    fn select_source(&self, workdir: &Path) -> CrosscalResult<SolutionSource> {
        let polcal_dir = workdir.join(&self.names.polcal);
        let fluxcal_dir = workdir.join(&self.names.fluxcal);

        if SolutionTable::all_present_in(&SolutionTable::POLARISED, &polcal_dir) {
            tracing::info!(
                "# Copying calibrator solutions (bandpass, gains, leakage, angle) from polarised calibrator #"
            );
            Ok(SolutionSource::PolarisationCalibrator)
        } else if SolutionTable::all_present_in(&SolutionTable::UNPOLARISED, &fluxcal_dir) {
            tracing::info!("# Copying calibrator solutions (bandpass, gains) from flux calibrator #");
            tracing::info!("# Polarisation calibration solutions (leakage, angle) not found #");
            Ok(SolutionSource::FluxCalibrator)
        } else {
            tracing::error!("# No calibrator solutions found! #");
            Err(CrosscalError::NoSolutions {
                searched: workdir.to_path_buf(),
            })
        }
    }

    // -------------------------------------------------------------------------
    // Introspection and cleanup
    // -------------------------------------------------------------------------

    /// Write the current value of every option named in the built-in defaults.
    ///
    /// Only the `CROSSCAL` section is listed unless `showall` is set. Options
    /// without a current value are left out.
    pub fn show(&self, showall: bool, out: &mut impl Write) -> CrosscalResult<()> {
        let current = self.config.to_table()?;
        let write_err = |e: std::io::Error| CrosscalError::io("write settings", e);

        for (section, options) in &self.defaults {
            if !showall && section != CROSSCAL_SECTION {
                continue;
            }
            writeln!(out, "{}", section).map_err(write_err)?;

            let Value::Table(options) = options else {
                continue;
            };
            let values = current.get(section).and_then(Value::as_table);
            for option in options.keys() {
                if let Some(value) = values.and_then(|v| v.get(option)) {
                    writeln!(out, "\t{} = {}", option, display_value(value)).map_err(write_err)?;
                }
            }
        }
        Ok(())
    }

    /// Delete everything inside the stage's working directory.
    ///
    /// Irreversible. Sibling and parent directories are not touched.
    pub fn reset(&mut self) -> CrosscalResult<()> {
        self.resolve();
        tracing::warn!("### Deleting all cross calibrated data. ###");
        let workdir = enter(&self.crosscal_dir)?.to_path_buf();
        let removed = remove_contents(&workdir)?;
        tracing::debug!("Removed {} entries from {}", removed, workdir.display());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DryRunEngine;

    fn controller(base: &Path) -> StageController<DryRunEngine> {
        let mut config = Config::defaults().expect("defaults");
        config.initial.basedir = base.display().to_string();
        config.initial.beam = "00".into();
        StageController::new(config, DryRunEngine::new()).expect("controller")
    }

    #[test]
    fn construction_resolves_paths_and_names() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctl = controller(tmp.path());

        assert_eq!(ctl.crosscal_dir(), tmp.path().join("00").join("crosscal"));
        assert_eq!(ctl.names().fluxcal, "3C147.mir");
        assert_eq!(ctl.names().polcal, "3C138.mir");
    }

    #[test]
    fn bandpass_parameters() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut ctl = controller(tmp.path());
        ctl.bandpass().expect("bandpass");

        let calls = ctl.engine().invocations();
        assert_eq!(calls.len(), 1);
        let task = &calls[0].task;
        assert_eq!(task.to_string(), "mfcal vis=3C147.mir stokes=ii options=delay interval=1000");
        assert_eq!(calls[0].workdir, ctl.crosscal_dir());
        assert!(ctl.crosscal_dir().is_dir());
    }

    #[test]
    fn bandpass_without_delay_has_no_options() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut ctl = controller(tmp.path());
        ctl.config.crosscal.crosscal_delay = false;
        ctl.bandpass().expect("bandpass");

        let task = &ctl.engine().invocations()[0].task;
        assert_eq!(task.get("options"), None);
        assert_eq!(task.get("interval"), Some("1000"));
    }

    #[test]
    fn show_lists_crosscal_only_by_default() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctl = controller(tmp.path());

        let mut out = Vec::new();
        ctl.show(false, &mut out).expect("show");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("CROSSCAL\n"));
        assert!(text.contains("\tcrosscal_bandpass = true\n"));
        assert!(!text.contains("INITIAL"));
    }

    #[test]
    fn show_all_lists_every_section() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let ctl = controller(tmp.path());

        let mut out = Vec::new();
        ctl.show(true, &mut out).expect("show");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("INITIAL\n"));
        assert!(text.contains("\tfluxcal = 3C147.MS\n"));
        assert!(text.contains("CROSSCAL\n"));
    }
}

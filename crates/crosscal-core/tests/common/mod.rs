//! Shared fixtures for the integration tests: an on-disk beam layout, an
//! engine that can be told to fail, and log capture.

#![allow(dead_code)]

use crosscal_core::{
    CalibrationEngine, Config, DryRunEngine, EngineError, Invocation, SolutionTable,
    StageController, Task, VISDATA_MARKER,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const FLUXCAL: &str = "3C147.mir";
pub const POLCAL: &str = "3C138.mir";
pub const TARGET: &str = "target.mir";

// =============================================================================
// BEAM LAYOUT FIXTURE
// =============================================================================

/// A temporary `<basedir>` holding beam `00` as the working beam.
pub struct Fixture {
    _tmp: TempDir,
    pub base: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let base = tmp.path().canonicalize().expect("canonicalize");
        Self { _tmp: tmp, base }
    }

    /// Default configuration pointed at this fixture's base directory.
    pub fn config(&self) -> Config {
        let mut config = Config::defaults().expect("defaults");
        config.initial.basedir = self.base.display().to_string();
        config.initial.beam = "00".into();
        config
    }

    pub fn crosscal_dir(&self) -> PathBuf {
        self.base.join("00").join("crosscal")
    }

    /// Create solution table files for `dataset` in the working beam.
    pub fn solutions(&self, dataset: &str, tables: &[SolutionTable]) {
        let dir = self.crosscal_dir().join(dataset);
        std::fs::create_dir_all(&dir).expect("mkdir dataset");
        for table in tables {
            std::fs::write(dir.join(table.file_name()), b"").expect("write table");
        }
    }

    /// Create beam `name` with a target dataset, with or without visibilities.
    pub fn beam(&self, name: &str, with_data: bool) -> PathBuf {
        let target = self.base.join(name).join("crosscal").join(TARGET);
        std::fs::create_dir_all(&target).expect("mkdir target");
        if with_data {
            std::fs::write(target.join(VISDATA_MARKER), b"").expect("write visdata");
        }
        target
    }

    pub fn controller(&self, config: Config) -> StageController<DryRunEngine> {
        StageController::new(config, DryRunEngine::new()).expect("controller")
    }
}

// =============================================================================
// FAILING ENGINE
// =============================================================================

/// Records every task and fails the first one named `fail_on`.
#[derive(Debug, Default)]
pub struct FailingEngine {
    pub fail_on: String,
    pub calls: Vec<String>,
}

impl FailingEngine {
    pub fn new(fail_on: &str) -> Self {
        Self {
            fail_on: fail_on.to_string(),
            calls: Vec::new(),
        }
    }
}

impl CalibrationEngine for FailingEngine {
    fn run(&mut self, task: &Task, _workdir: &Path) -> Result<(), EngineError> {
        self.calls.push(task.name().to_string());
        if task.name() == self.fail_on {
            return Err(EngineError::Failed {
                task: task.name().to_string(),
                code: 1,
                stderr: "### Fatal Error: simulated".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub fn names(calls: &[Invocation]) -> Vec<&str> {
    calls.iter().map(|c| c.task.name()).collect()
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().expect("lock");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every log line at any level written into the returned sink.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

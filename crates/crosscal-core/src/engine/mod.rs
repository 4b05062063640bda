//! # Calibration Engine
//!
//! The numerics of cross-calibration are done by an external engine. This
//! module describes a single engine invocation ([`Task`]) and the seam the
//! controller calls through ([`CalibrationEngine`]).
//!
//! Two engines are provided:
//! - [`MiriadEngine`] runs the MIRIAD task executables
//! - [`DryRunEngine`] records and logs invocations without running anything
//!
//! Every invocation blocks until the task exits. There are no timeouts and
//! no retries.

use crate::types::EngineError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

// =============================================================================
// TASK
// =============================================================================

/// A named engine task with `key=value` parameters, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    name: String,
    params: Vec<(String, String)>,
}

impl Task {
    /// Create a task with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Set a parameter, replacing an earlier value for the same key.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Task (executable) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of parameter `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Command-line arguments in `key=value` form.
    pub fn args(&self) -> impl Iterator<Item = String> + '_ {
        self.params.iter().map(|(k, v)| format!("{}={}", k, v))
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in self.args() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// =============================================================================
// ENGINE TRAIT
// =============================================================================

/// Runs calibration tasks.
pub trait CalibrationEngine {
    /// Run `task` with `workdir` as its working directory.
    fn run(&mut self, task: &Task, workdir: &Path) -> Result<(), EngineError>;
}

impl<E: CalibrationEngine + ?Sized> CalibrationEngine for &mut E {
    fn run(&mut self, task: &Task, workdir: &Path) -> Result<(), EngineError> {
        (**self).run(task, workdir)
    }
}

impl<E: CalibrationEngine + ?Sized> CalibrationEngine for Box<E> {
    fn run(&mut self, task: &Task, workdir: &Path) -> Result<(), EngineError> {
        (**self).run(task, workdir)
    }
}

// =============================================================================
// MIRIAD ENGINE
// =============================================================================

/// Runs MIRIAD task executables as child processes.
#[derive(Debug, Clone, Default)]
pub struct MiriadEngine {
    /// Directory holding the task executables. `None` searches `PATH`.
    bin_dir: Option<PathBuf>,
}

impl MiriadEngine {
    /// Engine that finds tasks on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that runs tasks from `bin_dir`.
    #[must_use]
    pub fn with_bin_dir(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: Some(bin_dir.into()),
        }
    }

    fn program(&self, task: &Task) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(task.name()),
            None => PathBuf::from(task.name()),
        }
    }
}

impl CalibrationEngine for MiriadEngine {
    fn run(&mut self, task: &Task, workdir: &Path) -> Result<(), EngineError> {
        tracing::debug!("Running: {} (in {})", task, workdir.display());

        let output = Command::new(self.program(task))
            .args(task.args())
            .current_dir(workdir)
            .output()
            .map_err(|source| EngineError::Spawn {
                task: task.name().to_string(),
                source,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(task = task.name(), "{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                task: task.name().to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// DRY-RUN ENGINE
// =============================================================================

/// A task handed to the engine, with the directory it was run in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task: Task,
    pub workdir: PathBuf,
}

/// Logs and records every task instead of running it.
#[derive(Debug, Clone, Default)]
pub struct DryRunEngine {
    invocations: Vec<Invocation>,
}

impl DryRunEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task seen so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// Names of the tasks seen so far, in call order.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.invocations.iter().map(|i| i.task.name()).collect()
    }
}

impl CalibrationEngine for DryRunEngine {
    fn run(&mut self, task: &Task, workdir: &Path) -> Result<(), EngineError> {
        tracing::info!("[dry-run] {} (in {})", task, workdir.display());
        self.invocations.push(Invocation {
            task: task.clone(),
            workdir: workdir.to_path_buf(),
        });
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn task_renders_command_line_in_order() {
        let task = Task::new("mfcal")
            .param("vis", "3C147.mir")
            .param("stokes", "ii")
            .param("interval", 1000);

        assert_eq!(task.to_string(), "mfcal vis=3C147.mir stokes=ii interval=1000");
        assert_eq!(task.get("interval"), Some("1000"));
        assert_eq!(task.get("options"), None);
    }

    #[test]
    fn repeated_param_replaces_value() {
        let task = Task::new("gpcopy").param("out", "a").param("out", "b");
        assert_eq!(task.args().collect::<Vec<_>>(), vec!["out=b"]);
    }

    #[test]
    fn dry_run_records_workdir() {
        let mut engine = DryRunEngine::new();
        engine
            .run(&Task::new("gpcal"), Path::new("/data/00/crosscal"))
            .expect("run");

        assert_eq!(engine.task_names(), vec!["gpcal"]);
        assert_eq!(
            engine.invocations()[0].workdir,
            PathBuf::from("/data/00/crosscal")
        );
    }

    #[test]
    fn missing_executable_is_spawn_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut engine = MiriadEngine::with_bin_dir(tmp.path());

        let result = engine.run(&Task::new("mfcal"), tmp.path());
        assert!(matches!(result, Err(EngineError::Spawn { ref task, .. }) if task == "mfcal"));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("stat").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
    }

    #[cfg(unix)]
    #[test]
    fn miriad_engine_passes_args_and_workdir() {
        let bin = tempfile::tempdir().expect("bin");
        let work = tempfile::tempdir().expect("work");
        write_script(bin.path(), "gpcal", "echo \"$@\" > called.txt");

        let mut engine = MiriadEngine::with_bin_dir(bin.path());
        let task = Task::new("gpcal")
            .param("vis", "3C138.mir")
            .param("options", "xyvary,linear");
        engine.run(&task, work.path()).expect("run");

        let recorded = std::fs::read_to_string(work.path().join("called.txt")).expect("read");
        assert_eq!(recorded.trim(), "vis=3C138.mir options=xyvary,linear");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_failure_with_stderr() {
        let bin = tempfile::tempdir().expect("bin");
        write_script(bin.path(), "mfcal", "echo 'bad vis' >&2; exit 3");

        let mut engine = MiriadEngine::with_bin_dir(bin.path());
        let result = engine.run(&Task::new("mfcal"), bin.path());

        match result {
            Err(EngineError::Failed { task, code, stderr }) => {
                assert_eq!(task, "mfcal");
                assert_eq!(code, 3);
                assert_eq!(stderr, "bad vis");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}

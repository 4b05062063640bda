//! Directory management for the stage: enter, clear and enumerate.

use crate::types::{CrosscalError, CrosscalResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Make `dir` the place the next operations act in.
///
/// Creates the directory (and parents) if it does not exist yet and returns
/// it for use as an explicit working directory.
pub fn enter(dir: &Path) -> CrosscalResult<&Path> {
    if !dir.is_dir() {
        tracing::debug!("Creating directory {}", dir.display());
        fs::create_dir_all(dir)
            .map_err(|e| CrosscalError::io(format!("create {}", dir.display()), e))?;
    }
    Ok(dir)
}

/// Remove every entry inside `dir`, leaving `dir` itself in place.
///
/// Returns the number of top-level entries removed.
pub fn remove_contents(dir: &Path) -> CrosscalResult<usize> {
    let entries =
        fs::read_dir(dir).map_err(|e| CrosscalError::io(format!("list {}", dir.display()), e))?;

    let mut removed = 0;
    for entry in entries {
        let entry =
            entry.map_err(|e| CrosscalError::io(format!("list {}", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| CrosscalError::io(format!("stat {}", path.display()), e))?;

        let result = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| CrosscalError::io(format!("remove {}", path.display()), e))?;
        removed += 1;
    }
    Ok(removed)
}

/// Entries of `root` matching the shell pattern `*`, sorted by name.
///
/// Hidden entries (leading `.`) are not matched, as with a shell glob.
pub fn list_beams(root: &Path) -> CrosscalResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(root).map_err(|e| CrosscalError::io(format!("list {}", root.display()), e))?;

    let mut beams = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| CrosscalError::io(format!("list {}", root.display()), e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        beams.push(entry.path());
    }
    beams.sort();
    Ok(beams)
}

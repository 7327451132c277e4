//! Ephemeral working directories for a single backup run.
//!
//! A `StagingArea` owns its directory and removes it recursively when dropped,
//! whichever way the run ends. Removal failures are logged, never raised.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Hands out uniquely named staging areas below a root directory.
#[derive(Debug, Clone)]
pub struct StagingManager {
    root: PathBuf,
}

impl StagingManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging areas under the system temporary directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Create a fresh, empty staging area.
    pub fn new_area(&self) -> io::Result<StagingArea> {
        let path = self.root.join(format!("backup-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "created staging area");
        Ok(StagingArea {
            path,
            released: false,
        })
    }
}

/// An exclusively owned temporary directory tree.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    released: bool,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the area now and report any failure.
    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        fs::remove_dir_all(&self.path)?;
        debug!(path = %self.path.display(), "released staging area");
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released staging area"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove staging area"),
        }
    }
}

/// Delete every entry directly inside `dir` except the one named `keep`.
///
/// Keeps going after a failed removal and returns the last error seen.
/// On success returns the number of entries removed.
pub fn prune(dir: &Path, keep: &OsStr) -> io::Result<usize> {
    let mut removed = 0;
    let mut last_error = None;

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };
        if entry.file_name() == keep {
            continue;
        }

        let path = entry.path();
        let result = match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to prune staging entry");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(removed),
    }
}

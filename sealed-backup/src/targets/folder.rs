//! Directory-backed target, e.g. a mounted NAS share.
//!
//! Artifacts are plain files in one directory; their modification time is the
//! timestamp the retention sweep compares against. Files not named like an
//! artifact are never touched.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Target;
use crate::fs::metadata::FileMetadata;
use crate::pipeline::is_artifact_name;
use crate::utils::errors::TargetError;

#[derive(Debug, Clone)]
pub struct FolderTarget {
    dir: PathBuf,
}

impl FolderTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

}

impl Target for FolderTarget {
    fn describe(&self) -> String {
        format!("folder:{}", self.dir.display())
    }

    fn upload(&self, file: &Path) -> Result<(), TargetError> {
        let name = file.file_name().ok_or_else(|| TargetError::Upload {
            target: self.describe(),
            reason: format!("{} has no file name", file.display()),
        })?;

        fs::create_dir_all(&self.dir)?;
        let destination = self.dir.join(name);
        let bytes = fs::copy(file, &destination)?;

        debug!(
            target = %self.describe(),
            name = %destination.display(),
            size = bytes,
            "uploaded file"
        );
        Ok(())
    }

    fn clean_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TargetError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut deleted = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if !entry.file_name().to_str().is_some_and(is_artifact_name) {
                continue;
            }

            let path = entry.path();
            let metadata = FileMetadata::from_path(&path)?;
            if metadata.modified < cutoff {
                fs::remove_file(&path)?;
                deleted += 1;
                debug!(
                    name = %path.display(),
                    timestamp = %metadata.modified,
                    size = metadata.size,
                    "deleted old backup"
                );
            }
        }

        Ok(deleted)
    }
}

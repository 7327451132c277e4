//! Local directory source: copies a directory tree into the staging area.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::Source;
use crate::fs::metadata::FileMetadata;
use crate::fs::walker::{is_empty_dir, walk_tree, WalkOptions};
use crate::utils::errors::SourceError;

#[derive(Debug, Clone)]
pub struct FolderSource {
    path: PathBuf,
}

impl FolderSource {
    pub fn new(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };
        Self {
            path: PathBuf::from(path),
        }
    }

    /// Directory name inside the staging area, suffixed when another source
    /// already claimed the same base name.
    fn destination_dir(&self, destination: &Path) -> PathBuf {
        let base = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());

        let mut candidate = destination.join(&base);
        let mut suffix = 2;
        while candidate.exists() {
            candidate = destination.join(format!("{}_{}", base, suffix));
            suffix += 1;
        }
        candidate
    }
}

impl Source for FolderSource {
    fn describe(&self) -> String {
        format!("folder:{}", self.path.display())
    }

    fn backup(&self, destination: &Path) -> Result<(), SourceError> {
        if !self.path.is_dir() {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.path.display()),
            )));
        }
        if is_empty_dir(&self.path)? {
            return Err(SourceError::NothingToBackup(self.path.clone()));
        }

        let target = self.destination_dir(destination);
        let copied = copy_tree(&self.path, &target)?;

        debug!(
            source = %self.path.display(),
            destination = %target.display(),
            files = copied,
            "copied folder source"
        );
        Ok(())
    }
}

/// Recursively copy `source` into `target`, keeping permissions. Symlinks are
/// followed and copied as their contents; a broken link or a link loop fails
/// the copy. Returns the number of files copied.
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<usize> {
    fs::create_dir_all(target)?;

    let options = WalkOptions {
        follow_links: true,
        include_dirs: true,
        ..Default::default()
    };

    let mut copied = 0;
    for entry in walk_tree(source, &options)? {
        let dest = target.join(&entry.relative_path);
        if entry.is_dir {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&entry.path, &dest)?;
            FileMetadata::from_path(&entry.path)?.apply_to_path(&dest)?;
            copied += 1;
        }
    }

    Ok(copied)
}

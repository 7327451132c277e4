//! File metadata needed to restore permissions and judge artifact age.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// File metadata captured for archiving and retention
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,

    /// Last modification time
    pub modified: DateTime<Utc>,

    /// File permissions (Unix mode bits)
    pub permissions: Option<u32>,

    /// Is this a directory?
    pub is_dir: bool,
}

impl FileMetadata {
    /// Extract metadata from a file path (symlinks are followed)
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let modified = DateTime::<Utc>::from(metadata.modified()?);

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            Some(metadata.permissions().mode() & 0o7777)
        };

        #[cfg(not(unix))]
        let permissions = None;

        Ok(Self {
            size: metadata.len(),
            modified,
            permissions,
            is_dir: metadata.is_dir(),
        })
    }

    /// Apply the captured permissions to `path`
    pub fn apply_to_path(&self, path: &Path) -> std::io::Result<()> {
        match self.permissions {
            Some(mode) => apply_permissions(path, mode),
            None => Ok(()),
        }
    }
}

/// Set Unix permission bits on `path`. File type bits in `mode` are ignored.
#[cfg(unix)]
pub fn apply_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
pub fn apply_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

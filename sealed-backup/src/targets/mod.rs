//! Backup targets: where encrypted artifacts are shipped and aged out.

pub mod folder;

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::path::Path;

use crate::config::TargetConfig;
use crate::utils::errors::{ConfigError, TargetError};

pub use folder::FolderTarget;

pub trait Target: fmt::Debug + Send + Sync {
    /// Short description used in logs
    fn describe(&self) -> String;

    /// Ship the artifact at `file` to the target.
    fn upload(&self, file: &Path) -> Result<(), TargetError>;

    /// Delete every stored artifact older than `cutoff`, leaving the rest.
    /// Returns how many were deleted.
    fn clean_before(&self, cutoff: DateTime<Utc>) -> Result<usize, TargetError>;

    /// Retention sweep: drop artifacts older than `expiration_days` days.
    fn clean(&self, expiration_days: u32) -> Result<usize, TargetError> {
        self.clean_before(retention_cutoff(Utc::now(), expiration_days))
    }
}

/// Oldest timestamp an artifact may have and still be kept.
pub fn retention_cutoff(now: DateTime<Utc>, expiration_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(expiration_days))
}

/// Build a target from its configuration entry.
pub fn from_config(config: &TargetConfig) -> Result<Box<dyn Target>, ConfigError> {
    match config.kind.as_str() {
        "folder" => {
            let path = config
                .config
                .get("path")
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingTargetKey {
                    target: config.kind.clone(),
                    key: "path".to_string(),
                })?;
            Ok(Box::new(FolderTarget::new(path)))
        }
        other => Err(ConfigError::UnknownTarget(other.to_string())),
    }
}

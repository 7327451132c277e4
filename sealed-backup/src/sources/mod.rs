//! Backup sources: anything that can drop a self-contained copy of its data
//! into a staging directory.

pub mod folder;

use std::fmt;
use std::path::Path;

use crate::config::SourceConfig;
use crate::utils::errors::{ConfigError, SourceError};

pub use folder::FolderSource;

pub trait Source: fmt::Debug + Send + Sync {
    /// Short description used in logs
    fn describe(&self) -> String;

    /// Copy this source's data below `destination`, inside a subdirectory that
    /// does not collide with other sources. Must fail with
    /// `SourceError::NothingToBackup` rather than produce nothing.
    fn backup(&self, destination: &Path) -> Result<(), SourceError>;
}

/// Build a source from its configuration entry.
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn Source>, ConfigError> {
    match config.kind.as_str() {
        "folder" => {
            if config.path.trim().is_empty() {
                return Err(ConfigError::Invalid("folder source needs a path".to_string()));
            }
            Ok(Box::new(FolderSource::new(&config.path)))
        }
        other => Err(ConfigError::UnknownSource(other.to_string())),
    }
}

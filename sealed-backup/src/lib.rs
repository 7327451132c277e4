//! Sealed Backup Library
//!
//! Stages data from pluggable sources, packs it into a zip archive, encrypts
//! it with a password-derived AES-256-CBC key and ships the artifact to
//! pluggable targets with age-based retention. The restore path reverses it.

pub mod archive;
pub mod config;
pub mod crypto;
pub mod daemon;
pub mod fs;
pub mod pipeline;
pub mod sources;
pub mod staging;
pub mod targets;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{BackupJob, Pipeline, RunReport};
pub use utils::errors::{BackupError, PipelineError, PipelineStage};
pub type Result<T> = std::result::Result<T, BackupError>;

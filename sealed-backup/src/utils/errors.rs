//! Error types for the backup pipeline.
//!
//! Each concern owns its own error enum; the pipeline wraps whichever one
//! fired together with the stage it fired in.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid IV length: expected {expected} bytes, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    #[error("Invalid ciphertext length {0}: not a multiple of the block size")]
    InvalidCiphertextLength(usize),

    #[error("Corrupt padding: pad length {pad_len} exceeds buffer of {len} bytes")]
    CorruptPadding { pad_len: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("Archive entry escapes the destination: {0}")]
    UnsafeEntry(String),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Nothing to backup in {0}")]
    NothingToBackup(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Upload to {target} failed: {reason}")]
    Upload { target: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unknown source type: {0}")]
    UnknownSource(String),

    #[error("Unknown target type: {0}")]
    UnknownTarget(String),

    #[error("Target {target} is missing config key '{key}'")]
    MissingTargetKey { target: String, key: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline step a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Stage,
    Pack,
    Prune,
    Encrypt,
    Upload,
    Clean,
    Decrypt,
    Unpack,
    Cleanup,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Stage => "stage",
            PipelineStage::Pack => "pack",
            PipelineStage::Prune => "prune",
            PipelineStage::Encrypt => "encrypt",
            PipelineStage::Upload => "upload",
            PipelineStage::Clean => "clean",
            PipelineStage::Decrypt => "decrypt",
            PipelineStage::Unpack => "unpack",
            PipelineStage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// True when a source reported it had no data.
    pub fn is_nothing_to_backup(&self) -> bool {
        matches!(
            self.source,
            StageError::Source(SourceError::NothingToBackup(_))
        )
    }
}

/// Attach the failing stage to any error the pipeline can surface.
pub trait StageContext<T> {
    fn stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineError>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<StageError>,
{
    fn stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Backup task aborted: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = Err::<(), _>(CryptoError::InvalidCiphertextLength(17))
            .stage(PipelineStage::Decrypt)
            .unwrap_err();

        assert_eq!(err.stage, PipelineStage::Decrypt);
        assert_eq!(
            err.to_string(),
            "decrypt failed: Invalid ciphertext length 17: not a multiple of the block size"
        );
    }

    #[test]
    fn test_nothing_to_backup_detection() {
        let err = PipelineError::new(
            PipelineStage::Stage,
            SourceError::NothingToBackup(PathBuf::from("/data")),
        );
        assert!(err.is_nothing_to_backup());

        let err = PipelineError::new(PipelineStage::Pack, io::Error::other("disk full"));
        assert!(!err.is_nothing_to_backup());
    }
}

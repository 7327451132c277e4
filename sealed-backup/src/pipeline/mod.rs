//! Backup and restore orchestration.
//!
//! A backup run is strictly sequential:
//! stage → pack → prune → encrypt → (upload → clean per target).
//! The first failing step aborts the run and is reported with its stage.
//! Completed steps are not rolled back; staging areas are removed when they
//! go out of scope.

use chrono::{DateTime, Local, NaiveDateTime};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::archive::{self, Compression};
use crate::config::BackupConfig;
use crate::crypto;
use crate::sources::{self, Source};
use crate::staging::{self, StagingArea, StagingManager};
use crate::targets::{self, Target};
use crate::utils::errors::{ConfigError, PipelineError, PipelineStage, StageContext};

/// Timestamp layout used in artifact names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Extension of encrypted artifacts
pub const ARTIFACT_EXTENSION: &str = "bin";

const ARTIFACT_PREFIX: &str = "backup_";

/// `backup_<YYYY-MM-DD_HH-MM-SS>.<extension>`
pub fn artifact_name(timestamp: DateTime<Local>, extension: &str) -> String {
    format!("{}{}.{}", ARTIFACT_PREFIX, timestamp.format(TIMESTAMP_FORMAT), extension)
}

/// True for names produced by `artifact_name(_, ARTIFACT_EXTENSION)`.
pub fn is_artifact_name(name: &str) -> bool {
    name.strip_prefix(ARTIFACT_PREFIX)
        .and_then(|rest| rest.strip_suffix(ARTIFACT_EXTENSION))
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|timestamp| NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok())
}

/// A target together with its retention policy
#[derive(Debug)]
pub struct TargetBinding {
    pub target: Box<dyn Target>,
    pub expiration_days: u32,
}

/// Everything one backup run needs. Immutable once built.
pub struct BackupJob {
    password: String,
    sources: Vec<Box<dyn Source>>,
    targets: Vec<TargetBinding>,
}

impl BackupJob {
    pub fn new(
        password: impl Into<String>,
        sources: Vec<Box<dyn Source>>,
        targets: Vec<TargetBinding>,
    ) -> Self {
        Self {
            password: password.into(),
            sources,
            targets,
        }
    }

    /// Resolve configured sources and targets.
    pub fn from_config(config: &BackupConfig) -> Result<Self, ConfigError> {
        let sources = config
            .sources
            .iter()
            .map(sources::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        let targets = config
            .targets
            .iter()
            .map(|cfg| {
                Ok(TargetBinding {
                    target: targets::from_config(cfg)?,
                    expiration_days: cfg.expiration_days()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self::new(config.encryption_password.clone(), sources, targets))
    }
}

impl fmt::Debug for BackupJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupJob")
            .field("password", &"[REDACTED]")
            .field("sources", &self.sources)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Drop for BackupJob {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// File name of the encrypted artifact
    pub artifact: String,
    pub files: usize,
    pub archive_bytes: u64,
    pub encrypted_bytes: u64,
    /// Number of targets the artifact was delivered to
    pub delivered: usize,
    /// Artifacts removed by the retention sweeps
    pub expired: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct Pipeline {
    job: BackupJob,
    staging: StagingManager,
    compression: Compression,
}

impl Pipeline {
    pub fn new(job: BackupJob, staging: StagingManager, compression: Compression) -> Self {
        Self {
            job,
            staging,
            compression,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Result<Self, ConfigError> {
        let staging = match &config.work_dir {
            Some(dir) => StagingManager::new(dir),
            None => StagingManager::system(),
        };
        Ok(Self::new(
            BackupJob::from_config(config)?,
            staging,
            config.compression,
        ))
    }

    /// Stage every source, archive, and write the encrypted artifact to
    /// `output`. Nothing is delivered.
    pub fn encrypt_to(&self, output: &Path) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let timestamp = Local::now();

        let area = self.staging.new_area().stage(PipelineStage::Stage)?;
        self.stage_sources(&area)?;

        let archive_name = artifact_name(timestamp, "zip");
        let archive_path = area.path().join(&archive_name);
        let stats = archive::pack_to_file(area.path(), &archive_path, self.compression)
            .stage(PipelineStage::Pack)?;
        let archive_bytes = fs::metadata(&archive_path).stage(PipelineStage::Pack)?.len();
        info!(
            archive = %archive_path.display(),
            files = stats.files,
            bytes = archive_bytes,
            "compressed backup"
        );

        let pruned = staging::prune(area.path(), OsStr::new(&archive_name))
            .stage(PipelineStage::Prune)?;
        debug!(entries = pruned, "deleted uncompressed backup");

        let encrypted_bytes = crypto::encrypt_file(&archive_path, output, &self.job.password)
            .stage(PipelineStage::Encrypt)?;
        info!(
            destination = %output.display(),
            bytes = encrypted_bytes,
            "encrypted backup"
        );

        if let Err(e) = area.release() {
            warn!(error = %e, "failed to remove staging area");
        }

        Ok(RunReport {
            artifact: output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            files: stats.files,
            archive_bytes,
            encrypted_bytes,
            delivered: 0,
            expired: 0,
            duration: started.elapsed(),
        })
    }

    /// Full run: produce a fresh artifact, deliver it to every target and
    /// sweep each target's expired artifacts.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();

        let outbox = self.staging.new_area().stage(PipelineStage::Stage)?;
        let artifact = outbox.path().join(artifact_name(Local::now(), ARTIFACT_EXTENSION));
        let mut report = self.encrypt_to(&artifact)?;

        for binding in &self.job.targets {
            let target = binding.target.describe();

            binding.target.upload(&artifact).stage(PipelineStage::Upload)?;
            info!(target = %target, artifact = %report.artifact, "uploaded backup");
            report.delivered += 1;

            let expired = binding
                .target
                .clean(binding.expiration_days)
                .stage(PipelineStage::Clean)?;
            info!(
                target = %target,
                expiration_days = binding.expiration_days,
                deleted = expired,
                "cleaned old backups"
            );
            report.expired += expired;
        }

        drop(outbox);
        report.duration = started.elapsed();
        Ok(report)
    }

    fn stage_sources(&self, area: &StagingArea) -> Result<(), PipelineError> {
        for source in &self.job.sources {
            source.backup(area.path()).stage(PipelineStage::Stage)?;
            debug!(source = %source.describe(), "backed up source");
        }
        debug!(destination = %area.path().display(), "staged all sources");
        Ok(())
    }
}

/// Decrypt an artifact into a plaintext archive file. Returns the archive size.
pub fn decrypt_file(encrypted: &Path, output: &Path, password: &str) -> Result<u64, PipelineError> {
    crypto::decrypt_file(encrypted, output, password).stage(PipelineStage::Decrypt)
}

/// Path of the intermediate archive used while restoring `encrypted`:
/// the `.bin` extension is swapped for `.zip`, any other name gains `.zip`.
pub fn intermediate_archive_path(encrypted: &Path) -> PathBuf {
    let name = encrypted
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(".bin").unwrap_or(&name);
    encrypted.with_file_name(format!("{}.zip", stem))
}

/// Decrypt an artifact and extract it into `destination`.
///
/// The intermediate archive is written next to the artifact and deleted once
/// extraction succeeds. On failure it is left in place.
pub fn restore(encrypted: &Path, destination: &Path, password: &str) -> Result<(), PipelineError> {
    let archive_path = intermediate_archive_path(encrypted);

    decrypt_file(encrypted, &archive_path, password)?;
    debug!(archive = %archive_path.display(), "decrypted backup");

    let stats = archive::unpack_file(&archive_path, destination).stage(PipelineStage::Unpack)?;
    info!(
        destination = %destination.display(),
        files = stats.files,
        dirs = stats.dirs,
        "restored backup"
    );

    fs::remove_file(&archive_path).stage(PipelineStage::Cleanup)?;
    Ok(())
}

//! Run loop driving the backup pipeline.
//!
//! The first run starts immediately. In run-once mode its outcome is the
//! outcome of the process; otherwise failures are logged and the loop waits
//! for the next tick or for cancellation, whichever comes first.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pipeline::{Pipeline, RunReport};
use crate::utils::{BackupError, Result};

#[derive(Debug, Clone)]
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    run_once_and_exit: bool,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, run_once_and_exit: bool, interval: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_once_and_exit,
            interval,
        }
    }

    /// Run until the single run finishes (run-once mode) or `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.run_once_and_exit {
            let report = self.run_backup().await?;
            info!(artifact = %report.artifact, "backup finished, exiting");
            return Ok(());
        }

        info!(interval_secs = self.interval.as_secs(), "starting backup loop");
        loop {
            if let Err(e) = self.run_backup().await {
                error!(error = %e, "backup failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("backup loop stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One pipeline run on the blocking pool.
    async fn run_backup(&self) -> Result<RunReport> {
        let pipeline = Arc::clone(&self.pipeline);
        let report = tokio::task::spawn_blocking(move || pipeline.run())
            .await
            .map_err(|e| BackupError::Task(e.to_string()))??;

        if report.delivered == 0 {
            warn!(artifact = %report.artifact, "no targets configured, backup was not delivered");
        }
        info!(
            artifact = %report.artifact,
            encrypted_bytes = report.encrypted_bytes,
            targets = report.delivered,
            expired = report.expired,
            duration_ms = report.duration.as_millis() as u64,
            "backup completed"
        );
        Ok(report)
    }
}

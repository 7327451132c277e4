//! Sealed Backup - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealed_backup::{
    config::Config,
    daemon::{Scheduler, ShutdownCoordinator},
    pipeline::{self, Pipeline},
    utils,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage all sources and write one encrypted artifact, without uploading
    Encrypt {
        /// Path to configuration file
        #[arg(short, long = "config-path", value_name = "FILE", default_value = "./example_config.yaml")]
        config: PathBuf,

        /// Where to write the encrypted artifact
        #[arg(short, long, value_name = "FILE", default_value = "./backup.bin")]
        output: PathBuf,
    },

    /// Run backups according to the configured run mode
    Backup {
        /// Path to configuration file
        #[arg(short, long = "config-path", value_name = "FILE", default_value = "./example_config.yaml")]
        config: PathBuf,
    },

    /// Decrypt an artifact into a zip archive
    Decrypt {
        /// Encrypted artifact
        file: PathBuf,

        /// Encryption password
        #[arg(short, long, env = "SEALED_BACKUP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Where to write the decrypted archive
        #[arg(short, long, value_name = "FILE", default_value = "./decrypted_file.zip")]
        output: PathBuf,
    },

    /// Decrypt an artifact and extract it
    Restore {
        /// Encrypted artifact
        file: PathBuf,

        /// Encryption password
        #[arg(short, long, env = "SEALED_BACKUP_PASSWORD", hide_env_values = true)]
        password: String,

        /// Directory to restore into
        #[arg(short, long, value_name = "DIR", default_value = "./")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Encrypt { config, output } => {
            let config = load_config(&config, args.log_level.as_deref())?;
            let pipeline = Pipeline::from_config(&config.backup)?;

            let report = tokio::task::spawn_blocking(move || pipeline.encrypt_to(&output))
                .await?
                .context("Failed to create encrypted backup")?;
            tracing::info!(
                artifact = %report.artifact,
                bytes = report.encrypted_bytes,
                "encrypted backup written"
            );
        }
        Command::Backup { config } => {
            let config = load_config(&config, args.log_level.as_deref())?;
            let pipeline = Pipeline::from_config(&config.backup)?;
            let interval = if config.run_mode.run_once_and_exit {
                std::time::Duration::ZERO
            } else {
                config.run_mode.interval()?
            };
            let scheduler = Scheduler::new(pipeline, config.run_mode.run_once_and_exit, interval);

            let shutdown = ShutdownCoordinator::new();
            let signals = shutdown.clone();
            tokio::spawn(async move { signals.wait_for_signal().await });

            scheduler
                .run(shutdown.token())
                .await
                .context("Backup failed")?;
        }
        Command::Decrypt { file, password, output } => {
            utils::logger::init(args.log_level.as_deref().unwrap_or_default())?;

            let destination = output.clone();
            let bytes = tokio::task::spawn_blocking(move || pipeline::decrypt_file(&file, &output, &password))
                .await?
                .context("Failed to decrypt backup")?;
            tracing::info!(output = %destination.display(), bytes, "decrypted backup");
        }
        Command::Restore { file, password, output } => {
            utils::logger::init(args.log_level.as_deref().unwrap_or_default())?;

            tokio::task::spawn_blocking(move || pipeline::restore(&file, &output, &password))
                .await?
                .context("Failed to restore backup")?;
        }
    }

    Ok(())
}

/// Load configuration and initialize logging from it.
fn load_config(path: &Path, log_level: Option<&str>) -> Result<Config> {
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    utils::logger::init(log_level.unwrap_or(&config.runtime.log_level))?;

    tracing::info!("Starting sealed-backup v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(config = ?config, "loaded configuration");
    Ok(config)
}

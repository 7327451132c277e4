//! Configuration management.
//!
//! Loads configuration from a YAML file with environment variable overrides
//! (`SEALED_BACKUP_<SECTION>__<KEY>`, e.g.
//! `SEALED_BACKUP_BACKUP__ENCRYPTION_PASSWORD`).

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::Compression;
use crate::utils::logger;
use crate::utils::errors::ConfigError;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "SEALED_BACKUP";

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub run_mode: RunModeConfig,

    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Log level (trace, debug, info, warn, error); empty means debug, anything
    /// else is rejected
    #[serde(default)]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunModeConfig {
    /// Run a single backup and exit; failures become fatal
    #[serde(default)]
    pub run_once_and_exit: bool,

    /// Time between runs, e.g. "24h" or "1h30m"
    #[serde(default = "default_interval")]
    pub interval: String,
}

#[derive(Clone, Deserialize)]
pub struct BackupConfig {
    /// Password the artifact key is derived from
    #[serde(default)]
    pub encryption_password: String,

    /// Root for staging areas (defaults to the system temp dir)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Compression applied to archive entries
    #[serde(default)]
    pub compression: Compression,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source implementation ("folder")
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Target implementation ("folder")
    #[serde(rename = "type")]
    pub kind: String,

    /// Artifacts older than this many days are deleted after each upload
    #[serde(default)]
    pub backup_expiration_days: i64,

    /// Target specific settings
    #[serde(default)]
    pub config: HashMap<String, String>,
}

// Default values
fn default_interval() -> String {
    "24h".to_string()
}

impl Default for RunModeConfig {
    fn default() -> Self {
        Self {
            run_once_and_exit: false,
            interval: default_interval(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("runtime", &self.runtime)
            .field("run_mode", &self.run_mode)
            .field("backup", &self.backup)
            .finish()
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("encryption_password", &"[REDACTED]")
            .field("work_dir", &self.work_dir)
            .field("compression", &self.compression)
            .field("sources", &self.sources)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (no environment overrides).
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything the pipeline needs before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        logger::parse_level(&self.runtime.log_level)?;
        if self.backup.encryption_password.is_empty() {
            return Err(ConfigError::Invalid(
                "backup.encryption_password must be set".to_string(),
            ));
        }
        if self.backup.sources.is_empty() {
            return Err(ConfigError::Invalid(
                "backup.sources must list at least one source".to_string(),
            ));
        }
        for target in &self.backup.targets {
            target.expiration_days()?;
        }
        if !self.run_mode.run_once_and_exit {
            self.run_mode.interval()?;
        }
        Ok(())
    }
}

impl RunModeConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.interval)
    }
}

impl TargetConfig {
    pub fn expiration_days(&self) -> Result<u32, ConfigError> {
        u32::try_from(self.backup_expiration_days).map_err(|_| {
            ConfigError::Invalid(format!(
                "backup_expiration_days for {} target must be a non-negative number of days, got {}",
                self.kind, self.backup_expiration_days
            ))
        })
    }
}

/// Parse an interval such as "90s", "30m", "24h", "7d" or "1h30m".
pub fn parse_interval(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::Invalid(format!("invalid interval '{}'", value));

    let value = value.trim();
    if value.is_empty() {
        return Err(invalid());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for ch in value.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }

        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return Err(invalid()),
        };
        total = amount
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }

    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
runtime:
  log_level: info
run_mode:
  run_once_and_exit: false
  interval: 12h
backup:
  encryption_password: hunter2
  compression: zstd
  sources:
    - type: folder
      path: /data/photos
  targets:
    - type: folder
      backup_expiration_days: 30
      config:
        path: /mnt/nas/backups
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.runtime.log_level, "info");
        assert_eq!(config.run_mode.interval().unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(config.backup.encryption_password, "hunter2");
        assert_eq!(config.backup.compression, Compression::Zstd);
        assert_eq!(config.backup.sources[0].kind, "folder");
        assert_eq!(config.backup.sources[0].path, "/data/photos");
        assert_eq!(config.backup.targets[0].expiration_days().unwrap(), 30);
        assert_eq!(config.backup.targets[0].config["path"], "/mnt/nas/backups");
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
backup:
  encryption_password: pw
  sources:
    - type: folder
      path: /data
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert!(config.runtime.log_level.is_empty());
        assert!(!config.run_mode.run_once_and_exit);
        assert_eq!(config.run_mode.interval().unwrap(), Duration::from_secs(24 * 3600));
        assert_eq!(config.backup.compression, Compression::Deflate);
        assert!(config.backup.targets.is_empty());
        assert!(config.backup.work_dir.is_none());
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let yaml = r#"
backup:
  sources:
    - type: folder
      path: /data
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let yaml = r#"
runtime:
  log_level: chatty
backup:
  encryption_password: pw
  sources:
    - type: folder
      path: /data
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_expiration_is_rejected() {
        let yaml = r#"
run_mode:
  run_once_and_exit: true
backup:
  encryption_password: pw
  sources:
    - type: folder
      path: /data
  targets:
    - type: folder
      backup_expiration_days: -1
      config:
        path: /backups
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("7d").unwrap(), Duration::from_secs(7 * 86400));

        for bad in ["", "10", "h", "5x", "0s", "1.5h"] {
            assert!(parse_interval(bad).is_err(), "{:?} should be rejected", bad);
        }
    }
}

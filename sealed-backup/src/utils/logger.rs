//! Logging configuration using tracing.

use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::utils::errors::ConfigError;

/// Level used when the configuration leaves `log_level` empty.
pub const DEFAULT_LEVEL: Level = Level::DEBUG;

/// Parse a configured log level. Empty means `DEFAULT_LEVEL`.
pub fn parse_level(level: &str) -> Result<Level, ConfigError> {
    let level = level.trim();
    if level.is_empty() {
        return Ok(DEFAULT_LEVEL);
    }
    level
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid log level '{}'", level)))
}

/// Initialize logging at `level`.
///
/// `RUST_LOG` takes precedence; an unparsable level is an error.
pub fn init(level: &str) -> anyhow::Result<()> {
    let level = parse_level(level)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

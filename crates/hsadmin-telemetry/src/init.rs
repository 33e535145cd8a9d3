//! Tracing subscriber installation and logging configuration.
//!
//! # Design
//! - Logs are written to stderr so command output on stdout stays parseable.
//! - `RUST_LOG` wins over the configured level when present.

use std::io;
use std::str::FromStr;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default logging filter when neither `RUST_LOG` nor verbosity flags are given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level or filter directive (e.g., `info`, `hsadmin_cli=debug`).
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::default(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable records.
    Pretty,
    /// One line per record.
    #[default]
    Compact,
    /// Structured JSON objects.
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(TelemetryError::UnknownFormat {
                value: value.to_string(),
            }),
        }
    }
}

/// Map a `-v` count to a level: none → warn, 1 → info, 2 → debug, more → trace.
#[must_use]
pub const fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_LOG_LEVEL,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_env_filter(config.level));
    let layer = fmt::layer().with_writer(io::stderr).with_target(false);
    let installed = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;
    tracing::debug!(level = config.level, format = ?config.format, "logging initialised");
    Ok(())
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

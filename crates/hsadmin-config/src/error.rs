//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file exists at the resolved path.
    #[error("configuration file {} not found", path.display())]
    NotFound {
        /// Path that was probed.
        path: PathBuf,
    },
    /// File system operation failed.
    #[error("failed to {operation} {}", path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Configuration file could not be parsed.
    #[error("configuration file {} is not valid YAML", path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// Configuration could not be rendered as YAML.
    #[error("failed to serialise configuration")]
    Serialize {
        /// Source YAML error.
        source: serde_yaml::Error,
    },
    /// A required entry was empty.
    #[error("configuration entry '{field}' is missing")]
    MissingField {
        /// Name of the empty entry.
        field: &'static str,
    },
    /// An entry held an unusable value.
    #[error("configuration entry '{field}' is invalid: {reason}")]
    InvalidField {
        /// Name of the offending entry.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Human-readable reason for the failure.
        reason: &'static str,
    },
    /// Output format name did not match any known format.
    #[error("unknown output format '{value}'")]
    UnknownFormat {
        /// Name provided by the caller.
        value: String,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

//! Configuration path resolution and YAML persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::AdminConfig;

/// File name used inside the platform configuration directory.
pub const CONFIG_FILE_NAME: &str = "hsadmin.yaml";

/// Platform default location of the configuration file.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

/// Load the configuration stored at `path`, merged over defaults.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when the file does not exist, and
/// IO or parse errors otherwise.
pub fn load_from(path: &Path) -> ConfigResult<AdminConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ConfigError::Io {
                operation: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        tracing::debug!(path = %path.display(), "configuration file empty; using defaults");
        return Ok(AdminConfig::default());
    }

    let config: AdminConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(path = %path.display(), config = ?config, "configuration read");
    Ok(config)
}

/// Load the configuration at `path`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns IO or parse errors for files that exist but cannot be read.
pub fn load_or_default(path: &Path) -> ConfigResult<AdminConfig> {
    match load_from(path) {
        Err(ConfigError::NotFound { .. }) => Ok(AdminConfig::default()),
        other => other,
    }
}

/// Write `config` to `path`, creating parent directories as needed.
///
/// On Unix the file is restricted to its owner since it holds a token.
///
/// # Errors
///
/// Returns serialisation or IO errors.
pub fn save_to(path: &Path, config: &AdminConfig) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let rendered = serde_yaml::to_string(config).map_err(|source| ConfigError::Serialize { source })?;
    fs::write(path, rendered).map_err(|source| ConfigError::Io {
        operation: "write",
        path: path.to_path_buf(),
        source,
    })?;
    restrict_permissions(path)?;
    tracing::info!(path = %path.display(), "configuration saved");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
        ConfigError::Io {
            operation: "restrict permissions of",
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path) -> ConfigResult<()> {
    tracing::warn!(
        path = %path.display(),
        "cannot restrict configuration file permissions on this platform; adjust them manually"
    );
    Ok(())
}

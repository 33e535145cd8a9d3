//! Typed configuration model, defaults and validation.

use std::fmt::{self, Debug, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Default homeserver client-API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8008";
/// Default path prefix of the admin API.
pub const DEFAULT_ADMIN_PATH: &str = "/_synapse/admin";
/// Default path prefix of the Matrix APIs.
pub const DEFAULT_MATRIX_PATH: &str = "/_matrix";
/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Placeholder older configuration files use for "discover the server name".
pub const AUTO_RETRIEVAL: &str = "auto-retrieval";

/// Rendering used for command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// YAML documents.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
    /// Single-line JSON.
    Minified,
    /// Tables and lists for terminals.
    Human,
}

impl OutputFormat {
    /// Every format, in the order abbreviations are resolved.
    pub const ALL: [Self; 4] = [Self::Yaml, Self::Json, Self::Minified, Self::Human];

    /// Canonical name used in files and flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Minified => "minified",
            Self::Human => "human",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    /// Accepts full names and unambiguous prefixes (`h`, `js`, `min`).
    fn from_str(value: &str) -> ConfigResult<Self> {
        let needle = value.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(ConfigError::UnknownFormat {
                value: value.to_string(),
            });
        }
        Self::ALL
            .into_iter()
            .find(|format| format.as_str().starts_with(&needle))
            .ok_or_else(|| ConfigError::UnknownFormat {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Persisted CLI configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Admin account the token belongs to.
    pub user: String,
    /// Admin access token.
    pub token: String,
    /// Base URL the homeserver listens on.
    pub base_url: String,
    /// Path prefix of the admin API.
    pub admin_path: String,
    /// Path prefix of the Matrix APIs.
    pub matrix_path: String,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    /// Default output format.
    pub format: OutputFormat,
    /// Verify TLS certificates.
    pub ssl_verify: bool,
    /// Server name used to build user IDs; discovered when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homeserver: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            admin_path: DEFAULT_ADMIN_PATH.to_string(),
            matrix_path: DEFAULT_MATRIX_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            format: OutputFormat::default(),
            ssl_verify: true,
            homeserver: None,
        }
    }
}

impl Debug for AdminConfig {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AdminConfig")
            .field("user", &self.user)
            .field("token", &"REDACTED")
            .field("base_url", &self.base_url)
            .field("admin_path", &self.admin_path)
            .field("matrix_path", &self.matrix_path)
            .field("timeout", &self.timeout)
            .field("format", &self.format)
            .field("ssl_verify", &self.ssl_verify)
            .field("homeserver", &self.homeserver)
            .finish()
    }
}

impl AdminConfig {
    /// Check that every entry needed to reach the admin API is usable.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid entry.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("user", &self.user),
            ("token", &self.token),
            ("base_url", &self.base_url),
            ("admin_path", &self.admin_path),
            ("matrix_path", &self.matrix_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { field });
            }
        }
        if self.timeout == 0 {
            return Err(ConfigError::InvalidField {
                field: "timeout",
                value: Some(self.timeout.to_string()),
                reason: "must be at least one second",
            });
        }
        self.parsed_base_url()?;
        Ok(())
    }

    /// Base URL parsed for request building.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the URL does not parse or
    /// is not an http(s) URL.
    pub fn parsed_base_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|_| ConfigError::InvalidField {
            field: "base_url",
            value: Some(self.base_url.clone()),
            reason: "not a valid URL",
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidField {
                field: "base_url",
                value: Some(self.base_url.clone()),
                reason: "scheme must be http or https",
            });
        }
        Ok(url)
    }

    /// HTTP timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Configured server name, ignoring the discovery placeholder.
    #[must_use]
    pub fn homeserver(&self) -> Option<&str> {
        self.homeserver
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != AUTO_RETRIEVAL)
    }

    /// Overlay the entries present in `patch`.
    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(user) = patch.user {
            self.user = user;
        }
        if let Some(token) = patch.token {
            self.token = token;
        }
        if let Some(base_url) = patch.base_url {
            self.base_url = base_url;
        }
        if let Some(admin_path) = patch.admin_path {
            self.admin_path = admin_path;
        }
        if let Some(matrix_path) = patch.matrix_path {
            self.matrix_path = matrix_path;
        }
        if let Some(timeout) = patch.timeout {
            self.timeout = timeout;
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(ssl_verify) = patch.ssl_verify {
            self.ssl_verify = ssl_verify;
        }
        if let Some(homeserver) = patch.homeserver {
            self.homeserver = Some(homeserver);
        }
    }
}

/// Partial update applied by the `config` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    /// Replacement admin user.
    pub user: Option<String>,
    /// Replacement token.
    pub token: Option<String>,
    /// Replacement base URL.
    pub base_url: Option<String>,
    /// Replacement admin API path.
    pub admin_path: Option<String>,
    /// Replacement Matrix API path.
    pub matrix_path: Option<String>,
    /// Replacement timeout in seconds.
    pub timeout: Option<u64>,
    /// Replacement default output format.
    pub format: Option<OutputFormat>,
    /// Replacement TLS verification flag.
    pub ssl_verify: Option<bool>,
    /// Replacement server name.
    pub homeserver: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AdminConfig {
        AdminConfig {
            user: "@admin:example.org".into(),
            token: "syt_secret".into(),
            ..AdminConfig::default()
        }
    }

    #[test]
    fn defaults_need_credentials() {
        let err = AdminConfig::default()
            .validate()
            .expect_err("default config lacks a user");
        assert!(matches!(err, ConfigError::MissingField { field: "user" }));
    }

    #[test]
    fn complete_config_validates() -> ConfigResult<()> {
        complete().validate()
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = AdminConfig {
            timeout: 0,
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "timeout",
                ..
            })
        ));
    }

    #[test]
    fn base_url_must_be_http() {
        let config = AdminConfig {
            base_url: "ftp://example.org".into(),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "base_url",
                ..
            })
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("syt_secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn output_format_accepts_prefixes() -> ConfigResult<()> {
        assert_eq!("h".parse::<OutputFormat>()?, OutputFormat::Human);
        assert_eq!("JS".parse::<OutputFormat>()?, OutputFormat::Json);
        assert_eq!("min".parse::<OutputFormat>()?, OutputFormat::Minified);
        assert_eq!("yaml".parse::<OutputFormat>()?, OutputFormat::Yaml);
        assert!("pprint".parse::<OutputFormat>().is_err());
        assert!("".parse::<OutputFormat>().is_err());
        Ok(())
    }

    #[test]
    fn discovery_placeholder_is_not_a_server_name() {
        let mut config = complete();
        config.homeserver = Some(AUTO_RETRIEVAL.into());
        assert_eq!(config.homeserver(), None);
        config.homeserver = Some("example.org".into());
        assert_eq!(config.homeserver(), Some("example.org"));
    }

    #[test]
    fn patch_overrides_only_present_entries() {
        let mut config = complete();
        config.apply(ConfigPatch {
            timeout: Some(5),
            format: Some(OutputFormat::Human),
            ..ConfigPatch::default()
        });
        assert_eq!(config.timeout, 5);
        assert_eq!(config.format, OutputFormat::Human);
        assert_eq!(config.user, "@admin:example.org");
    }
}

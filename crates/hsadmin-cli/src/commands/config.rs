use std::io::{self, IsTerminal};
use std::path::Path;

use hsadmin_config::{AdminConfig, ConfigError, ConfigPatch, OutputFormat, save_to};
use serde_json::Value;

use crate::cli::ConfigArgs;
use crate::client::{CliError, CliResult, prompt_secret};
use crate::output;

/// Map configuration errors onto exit codes: unreadable files are failures,
/// bad contents are the user's to fix.
pub(crate) fn config_error(err: ConfigError) -> CliError {
    match err {
        ConfigError::Io { .. } | ConfigError::Serialize { .. } => CliError::failure(err),
        other => CliError::validation(other.to_string()),
    }
}

pub(crate) fn handle_config(
    path: &Path,
    mut config: AdminConfig,
    args: ConfigArgs,
    format: Option<OutputFormat>,
) -> CliResult<()> {
    if args.show {
        return output::emit(&redacted(&config), format.unwrap_or(config.format));
    }

    config.apply(ConfigPatch {
        user: args.user,
        token: args.token,
        base_url: args.base_url,
        admin_path: args.admin_path,
        matrix_path: args.matrix_path,
        timeout: None,
        format,
        ssl_verify: args.ssl_verify,
        homeserver: args.homeserver,
    });

    if config.token.trim().is_empty() && io::stdin().is_terminal() {
        config.token = prompt_secret("Admin access token: ", "--token")?
            .trim()
            .to_string();
    }
    config.validate().map_err(config_error)?;
    save_to(path, &config).map_err(config_error)?;
    eprintln!("Configuration written to {}", path.display());
    Ok(())
}

/// Configuration as shown by `config --show`, with the token masked.
pub(crate) fn redacted(config: &AdminConfig) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or_default();
    if let Some(token) = value.get_mut("token") {
        if token.as_str().is_some_and(|text| !text.is_empty()) {
            *token = Value::String("REDACTED".to_string());
        }
    }
    value
}

use std::fs;

use hsadmin_config::{
    AdminConfig, ConfigError, DEFAULT_ADMIN_PATH, DEFAULT_TIMEOUT_SECS, OutputFormat, load_from,
    load_or_default, save_to,
};
use tempfile::TempDir;

fn sample() -> AdminConfig {
    AdminConfig {
        user: "@admin:example.org".into(),
        token: "syt_token".into(),
        base_url: "https://matrix.example.org".into(),
        format: OutputFormat::Human,
        homeserver: Some("example.org".into()),
        ..AdminConfig::default()
    }
}

#[test]
fn saved_config_loads_back() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested/hsadmin.yaml");
    save_to(&path, &sample())?;
    assert_eq!(load_from(&path)?, sample());
    Ok(())
}

#[cfg(unix)]
#[test]
fn saved_config_is_owner_only() -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let path = dir.path().join("hsadmin.yaml");
    save_to(&path, &sample())?;
    let mode = fs::metadata(&path)?.permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    Ok(())
}

#[test]
fn partial_file_is_merged_over_defaults() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hsadmin.yaml");
    fs::write(&path, "user: '@admin:example.org'\ntoken: abc\nformat: json\n")?;
    let config = load_from(&path)?;
    assert_eq!(config.token, "abc");
    assert_eq!(config.format, OutputFormat::Json);
    assert_eq!(config.admin_path, DEFAULT_ADMIN_PATH);
    assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS);
    assert!(config.ssl_verify);
    config.validate()?;
    Ok(())
}

#[test]
fn missing_file_is_reported() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("absent.yaml");
    assert!(matches!(load_from(&path), Err(ConfigError::NotFound { .. })));
    assert_eq!(load_or_default(&path)?, AdminConfig::default());
    Ok(())
}

#[test]
fn invalid_yaml_is_a_parse_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hsadmin.yaml");
    fs::write(&path, "user: [unterminated\n")?;
    assert!(matches!(load_or_default(&path), Err(ConfigError::Parse { .. })));
    Ok(())
}

use std::fs;

use anyhow::anyhow;
use reqwest::Method;
use serde_json::Value;

use crate::cli::RawArgs;
use crate::client::{AppContext, CliError, CliResult};

pub(crate) async fn handle_version(ctx: &AppContext) -> CliResult<()> {
    let version = ctx.get(ctx.admin_url(&["v1", "server_version"])?).await?;
    ctx.emit(&version)
}

pub(crate) fn parse_method(raw: &str) -> CliResult<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::validation(format!("'{raw}' is not an HTTP method")))
}

pub(crate) fn request_body(args: &RawArgs) -> CliResult<Option<Value>> {
    let text = match (&args.data, &args.data_file) {
        (Some(data), _) => data.clone(),
        (None, Some(path)) => fs::read_to_string(path).map_err(|err| {
            CliError::failure(anyhow!("failed to read {}: {err}", path.display()))
        })?,
        (None, None) => return Ok(None),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| CliError::validation(format!("request body is not valid JSON: {err}")))
}

/// Split a raw endpoint into path segments and an optional query string.
pub(crate) fn split_endpoint(endpoint: &str) -> CliResult<(Vec<&str>, Option<&str>)> {
    let (path, query) = endpoint
        .split_once('?')
        .map_or((endpoint, None), |(path, query)| (path, Some(query)));
    let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if segments.is_empty() {
        return Err(CliError::validation("endpoint cannot be empty"));
    }
    Ok((segments, query.filter(|query| !query.is_empty())))
}

pub(crate) async fn handle_raw(ctx: &AppContext, args: RawArgs) -> CliResult<()> {
    let method = parse_method(&args.method)?;
    let body = request_body(&args)?;
    let (segments, query) = split_endpoint(&args.endpoint)?;

    let mut url = ctx.admin_url(&segments)?;
    url.set_query(query);

    let response = ctx.send(method, url, body.as_ref()).await?;
    ctx.emit(&response)
}

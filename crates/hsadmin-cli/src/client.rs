//! Shared admin API client, error types, and listing helpers for the CLI.

use std::fmt::{self, Display, Formatter};
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::anyhow;
use futures_util::StreamExt;
use hsadmin_config::{AdminConfig, OutputFormat};
use hsadmin_core::{OnMalformed, Page, PageError, paginate_stream};
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::output;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Query parameter carrying the continuation token of listing endpoints.
pub(crate) const CURSOR_PARAM: &str = "from";

const FULL_MXID_PATTERN: &str = r"^@[-./=\w]+:[-\[\].:\w]+$";
const LOCALPART_PATTERN: &str = r"^@?[-./=\w]+:?$";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

impl From<PageError<Self>> for CliError {
    fn from(err: PageError<Self>) -> Self {
        match err {
            PageError::Fetch(inner) => inner,
            PageError::Malformed(malformed) => Self::failure(malformed),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) admin_path: String,
    pub(crate) matrix_path: String,
    pub(crate) homeserver: Option<String>,
    pub(crate) format: OutputFormat,
    pub(crate) batch: bool,
}

impl AppContext {
    /// Build the HTTP client and context from a validated configuration.
    pub(crate) fn from_config(
        config: &AdminConfig,
        format: OutputFormat,
        batch: bool,
        trace_id: &str,
    ) -> CliResult<Self> {
        config.validate().map_err(|err| {
            CliError::validation(format!("{err}; run `hsadmin config` to set it up"))
        })?;
        let base_url = config
            .parsed_base_url()
            .map_err(|err| CliError::validation(err.to_string()))?;

        let mut default_headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| CliError::validation("token contains invalid characters"))?;
        bearer.set_sensitive(true);
        default_headers.insert(AUTHORIZATION, bearer);
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        if !config.ssl_verify {
            tracing::warn!("TLS certificate verification is disabled");
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            admin_path: config.admin_path.clone(),
            matrix_path: config.matrix_path.clone(),
            homeserver: config.homeserver().map(str::to_string),
            format,
            batch,
        })
    }

    /// Admin API URL made of the base URL, admin path, and `segments`.
    ///
    /// Each segment is percent-encoded on its own, so ids containing `/`
    /// stay a single path component.
    pub(crate) fn admin_url(&self, segments: &[&str]) -> CliResult<Url> {
        join_segments(&self.base_url, &self.admin_path, segments)
    }

    /// Matrix API URL made of the base URL, matrix path, and `segments`.
    pub(crate) fn matrix_url(&self, segments: &[&str]) -> CliResult<Url> {
        join_segments(&self.base_url, &self.matrix_path, segments)
    }

    /// Issue a request and decode its JSON body, classifying error statuses.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> CliResult<Value> {
        self.send_as(method, url, body, None).await
    }

    /// Like [`Self::send`], authenticating with `token` instead of the
    /// configured admin token when one is given.
    pub(crate) async fn send_as(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> CliResult<Value> {
        let path = url.path().to_string();
        tracing::info!(
            method = %method,
            path = %path,
            token_override = token.is_some(),
            "querying homeserver"
        );

        let mut request = self.client.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| CliError::failure(anyhow!("request to {path} failed: {err}")))?;

        if response.status().is_success() {
            let bytes = response.bytes().await.map_err(|err| {
                CliError::failure(anyhow!("failed to read response from {path}: {err}"))
            })?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Object(Map::new()));
            }
            serde_json::from_slice(&bytes).map_err(|err| {
                CliError::failure(anyhow!("response from {path} is not valid JSON: {err}"))
            })
        } else {
            Err(classify_problem(response).await)
        }
    }

    pub(crate) async fn get(&self, url: Url) -> CliResult<Value> {
        self.send(Method::GET, url, None).await
    }

    pub(crate) async fn post(&self, url: Url, body: &Value) -> CliResult<Value> {
        self.send(Method::POST, url, Some(body)).await
    }

    /// Fetch one page of a listing endpoint.
    ///
    /// An empty `cursor` requests the first page. Returns `None` when the
    /// response lacks `items_key`.
    pub(crate) async fn fetch_listing_page(
        &self,
        mut url: Url,
        cursor: String,
        items_key: &str,
        next_key: &str,
    ) -> CliResult<Option<Page<Value, String>>> {
        if !cursor.is_empty() {
            url.query_pairs_mut().append_pair(CURSOR_PARAM, &cursor);
        }
        let body = self.get(url).await?;
        Ok(listing_page(body, items_key, next_key))
    }

    /// Walk every page of a listing endpoint and collect its items.
    pub(crate) async fn walk_listing(
        &self,
        url: &Url,
        start: String,
        keys: (&str, &str),
        policy: OnMalformed,
    ) -> CliResult<Vec<Value>> {
        let (items_key, next_key) = keys;
        let mut pages = std::pin::pin!(paginate_stream(
            |cursor: String| self.fetch_listing_page(url.clone(), cursor, items_key, next_key),
            start,
            policy,
        ));

        let mut items = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page?;
            tracing::debug!(
                received = page.items.len(),
                next = ?page.next,
                "listing page received"
            );
            items.extend(page.items);
        }
        Ok(items)
    }

    /// Server name used to build user ids.
    ///
    /// Uses the configured name when present, otherwise asks the server-keys
    /// endpoint.
    pub(crate) async fn resolve_homeserver(&self) -> CliResult<String> {
        if let Some(name) = &self.homeserver {
            return Ok(name.clone());
        }
        let url = self.matrix_url(&["key", "v2", "server"])?;
        let body = self.get(url).await?;
        let name = body
            .get("server_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CliError::failure(anyhow!("server keys response did not include server_name"))
            })?;
        tracing::debug!(server_name = %name, "homeserver name discovered");
        Ok(name)
    }

    /// Turn a user id or bare localpart into a full user id.
    pub(crate) async fn generate_mxid(&self, input: &str) -> CliResult<String> {
        match classify_user_input(input)? {
            UserInput::Full(mxid) => Ok(mxid),
            UserInput::Localpart(localpart) => {
                let server = self.resolve_homeserver().await?;
                Ok(format!("@{localpart}:{server}"))
            }
        }
    }

    /// Ask for confirmation unless running in batch mode.
    pub(crate) fn confirm(&self, question: &str) -> CliResult<bool> {
        if self.batch {
            return Ok(true);
        }
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(CliError::validation(
                "confirmation required; pass --batch when running non-interactively",
            ));
        }

        eprint!("{question} [y/N]: ");
        io::stderr()
            .flush()
            .map_err(|err| CliError::failure(anyhow!("failed to write prompt: {err}")))?;
        let mut answer = String::new();
        stdin
            .lock()
            .read_line(&mut answer)
            .map_err(|err| CliError::failure(anyhow!("failed to read confirmation: {err}")))?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    /// Print `value` in the selected output format.
    pub(crate) fn emit(&self, value: &Value) -> CliResult<()> {
        output::emit(value, self.format)
    }

    /// Print `value`, or `note` on stderr when the server answered with an
    /// empty object.
    pub(crate) fn emit_or_note(&self, value: &Value, note: &str) -> CliResult<()> {
        if value.as_object().is_some_and(Map::is_empty) {
            eprintln!("{note}");
            return Ok(());
        }
        self.emit(value)
    }
}

/// Append the present `pairs` to the query string of `url`.
pub(crate) fn with_query(mut url: Url, pairs: &[(&str, Option<String>)]) -> Url {
    let present: Vec<(&str, &str)> = pairs
        .iter()
        .filter_map(|(key, value)| value.as_deref().map(|value| (*key, value)))
        .collect();
    if !present.is_empty() {
        url.query_pairs_mut().extend_pairs(present);
    }
    url
}

/// Read a secret from the terminal without echoing it.
pub(crate) fn prompt_secret(prompt: &str, flag: &str) -> CliResult<String> {
    if !io::stdin().is_terminal() {
        return Err(CliError::validation(format!(
            "{flag} is required when running non-interactively"
        )));
    }
    let secret = rpassword::prompt_password(prompt)
        .map_err(|err| CliError::failure(anyhow!("failed to read from stdin: {err}")))?;
    if secret.trim().is_empty() {
        return Err(CliError::validation(format!("{flag} cannot be empty")));
    }
    Ok(secret)
}

/// Print the abort notice used when a prompt is declined.
pub(crate) fn abort() -> CliResult<()> {
    println!("Abort.");
    Ok(())
}

fn join_segments(base: &Url, prefix: &str, segments: &[&str]) -> CliResult<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| CliError::validation(format!("base URL '{base}' cannot carry a path")))?
        .pop_if_empty()
        .extend(prefix.split('/').filter(|part| !part.is_empty()))
        .extend(segments);
    Ok(url)
}

fn listing_page(mut body: Value, items_key: &str, next_key: &str) -> Option<Page<Value, String>> {
    let next = body.get(next_key).and_then(cursor_token);
    match body.get_mut(items_key).map(Value::take) {
        Some(Value::Array(items)) => Some(Page::new(items, next)),
        _ => None,
    }
}

fn cursor_token(value: &Value) -> Option<String> {
    match value {
        Value::String(token) if !token.is_empty() => Some(token.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// How a user argument was written on the command line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum UserInput {
    Full(String),
    Localpart(String),
}

pub(crate) fn classify_user_input(input: &str) -> CliResult<UserInput> {
    let input = input.trim();
    if compile(FULL_MXID_PATTERN)?.is_match(input) {
        return Ok(UserInput::Full(input.to_string()));
    }
    if compile(LOCALPART_PATTERN)?.is_match(input) {
        let localpart = input.trim_start_matches('@').trim_end_matches(':');
        return Ok(UserInput::Localpart(localpart.to_string()));
    }
    Err(CliError::validation(format!(
        "'{input}' is neither a user id nor a localpart"
    )))
}

pub(crate) fn compile(pattern: &str) -> CliResult<Regex> {
    Regex::new(pattern)
        .map_err(|err| CliError::validation(format!("invalid pattern '{pattern}': {err}")))
}

#[derive(Debug, Deserialize)]
struct MatrixError {
    errcode: Option<String>,
    error: Option<String>,
}

/// Classify an HTTP response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let problem = serde_json::from_slice::<MatrixError>(&bytes).ok();
    let message = problem
        .as_ref()
        .and_then(|p| p.error.clone())
        .filter(|text| !text.is_empty())
        .unwrap_or(body_text);
    let errcode = problem.and_then(|p| p.errcode);

    if matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        let message = match (errcode, message.is_empty()) {
            (_, true) => format!("request rejected with status {status}"),
            (Some(code), false) => format!("{message} ({code})"),
            (None, false) => message,
        };
        CliError::validation(message)
    } else {
        let detail = match (errcode, message.is_empty()) {
            (Some(code), _) => format!("{message} ({code}, status {status})"),
            (None, false) => format!("{message} (status {status})"),
            (None, true) => format!("request failed with status {status}"),
        };
        CliError::failure(anyhow!(detail))
    }
}

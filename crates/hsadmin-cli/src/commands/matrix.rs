use crate::cli::MatrixRawArgs;
use crate::client::{AppContext, CliResult, prompt_secret};
use crate::commands::server::{parse_method, request_body, split_endpoint};

/// Token for a Matrix request: an interactive prompt wins over `--token` or
/// `$MTOKEN`; without either the configured admin token is used.
fn override_token(args: &MatrixRawArgs) -> CliResult<Option<String>> {
    if args.prompt {
        let token = prompt_secret("Matrix token: ", "--token")?;
        return Ok(Some(token.trim().to_string()));
    }
    Ok(args
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string))
}

/// Issue an arbitrary request below the Matrix API path.
pub(crate) async fn handle_matrix_raw(ctx: &AppContext, args: MatrixRawArgs) -> CliResult<()> {
    let method = parse_method(&args.request.method)?;
    let body = request_body(&args.request)?;
    let token = override_token(&args)?;
    let (segments, query) = split_endpoint(&args.request.endpoint)?;

    let mut url = ctx.matrix_url(&segments)?;
    url.set_query(query);

    let response = ctx
        .send_as(method, url, body.as_ref(), token.as_deref())
        .await?;
    ctx.emit(&response)
}

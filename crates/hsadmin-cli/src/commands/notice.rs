use std::fs;

use anyhow::anyhow;
use hsadmin_core::OnMalformed;
use serde_json::{Value, json};

use crate::cli::NoticeSendArgs;
use crate::client::{
    AppContext, CliError, CliResult, UserInput, abort, classify_user_input, compile, with_query,
};

const NOTICE_MSGTYPE: &str = "m.text";
const HTML_FORMAT: &str = "org.matrix.custom.html";

fn read_body(path: &str) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|err| CliError::failure(anyhow!("failed to read notice from {path}: {err}")))
}

/// Message content of a server notice.
fn notice_content(plain: String, formatted: Option<String>) -> Value {
    let mut content = json!({ "msgtype": NOTICE_MSGTYPE, "body": plain });
    if let Some(formatted) = formatted {
        content["format"] = Value::String(HTML_FORMAT.to_string());
        content["formatted_body"] = Value::String(formatted);
    }
    content
}

/// Resolve TO into the list of user ids that receive the notice.
///
/// A full user id names a single recipient. Anything else is treated as a
/// regular expression and matched against every user id on the server.
async fn recipients(ctx: &AppContext, to: &str, page_size: u64) -> CliResult<Vec<String>> {
    if let Ok(UserInput::Full(user_id)) = classify_user_input(to) {
        return Ok(vec![user_id]);
    }

    let pattern = compile(to)?;
    let url = with_query(
        ctx.admin_url(&["v2", "users"])?,
        &[("limit", Some(page_size.to_string()))],
    );
    let users = ctx
        .walk_listing(&url, "0".to_string(), ("users", "next_token"), OnMalformed::Fail)
        .await?;

    let matched: Vec<String> = users
        .iter()
        .filter_map(|user| user.get("name").and_then(Value::as_str))
        .filter(|name| pattern.is_match(name))
        .map(str::to_string)
        .collect();
    tracing::debug!(
        scanned = users.len(),
        matched = matched.len(),
        "notice recipients resolved"
    );
    Ok(matched)
}

pub(crate) async fn handle_notice_send(ctx: &AppContext, args: NoticeSendArgs) -> CliResult<()> {
    let (plain, formatted) = if args.from_file {
        let formatted = args.formatted.as_deref().map(read_body).transpose()?;
        (read_body(&args.plain)?, formatted)
    } else {
        (args.plain, args.formatted)
    };
    if plain.trim().is_empty() {
        return Err(CliError::validation("notice body cannot be empty"));
    }

    let recipients = recipients(ctx, &args.to, args.page_size).await?;
    if recipients.is_empty() {
        return Err(CliError::validation(format!(
            "no users match '{}'",
            args.to
        )));
    }

    if !ctx.batch {
        eprintln!("Recipients:");
        for user_id in &recipients {
            eprintln!("  {user_id}");
        }
    }
    if !ctx.confirm(&format!(
        "Send notice to {} user(s)?",
        recipients.len()
    ))? {
        return abort();
    }

    let content = notice_content(plain, formatted);
    let url = ctx.admin_url(&["v1", "send_server_notice"])?;
    let mut sent = Vec::with_capacity(recipients.len());
    for user_id in recipients {
        let response = ctx
            .post(
                url.clone(),
                &json!({ "user_id": user_id, "content": content }),
            )
            .await?;
        sent.push(json!({
            "user_id": user_id,
            "event_id": response.get("event_id").cloned().unwrap_or(Value::Null),
        }));
    }

    let total = sent.len();
    ctx.emit(&json!({ "sent": sent, "total": total }))
}

use chrono::Utc;
use hsadmin_core::MILLIS_PER_DAY;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::cli::{RegtokArgs, RegtokListArgs, RegtokNewArgs, RegtokUpdateArgs};
use crate::client::{AppContext, CliError, CliResult, abort, with_query};

fn expiry_after(days: u32) -> i64 {
    Utc::now()
        .timestamp_millis()
        .saturating_add(i64::from(days).saturating_mul(MILLIS_PER_DAY))
}

pub(crate) async fn handle_regtok_list(ctx: &AppContext, args: RegtokListArgs) -> CliResult<()> {
    let valid = match (args.valid, args.invalid) {
        (true, _) => Some("true".to_string()),
        (false, true) => Some("false".to_string()),
        (false, false) => None,
    };
    let url = with_query(
        ctx.admin_url(&["v1", "registration_tokens"])?,
        &[("valid", valid)],
    );
    let tokens = ctx.get(url).await?;
    ctx.emit(&tokens)
}

pub(crate) async fn handle_regtok_details(ctx: &AppContext, args: RegtokArgs) -> CliResult<()> {
    let details = ctx
        .get(ctx.admin_url(&["v1", "registration_tokens", &args.token])?)
        .await?;
    ctx.emit(&details)
}

pub(crate) async fn handle_regtok_new(ctx: &AppContext, args: RegtokNewArgs) -> CliResult<()> {
    let mut body = Map::new();
    if let Some(token) = args.token {
        body.insert("token".into(), Value::String(token));
    }
    if let Some(length) = args.length {
        body.insert("length".into(), json!(length));
    }
    if let Some(uses) = args.uses_allowed {
        body.insert("uses_allowed".into(), json!(uses));
    }
    if let Some(days) = args.expiry_days {
        body.insert("expiry_time".into(), json!(expiry_after(days)));
    }

    let created = ctx
        .post(
            ctx.admin_url(&["v1", "registration_tokens", "new"])?,
            &Value::Object(body),
        )
        .await?;
    ctx.emit(&created)
}

/// Request body for `regtok update`; a JSON null lifts the corresponding limit.
fn update_body(args: &RegtokUpdateArgs) -> CliResult<Map<String, Value>> {
    let mut body = Map::new();
    if let Some(uses) = args.uses_allowed {
        body.insert("uses_allowed".into(), json!(uses));
    } else if args.unlimited_uses {
        body.insert("uses_allowed".into(), Value::Null);
    }
    if let Some(days) = args.expiry_days {
        body.insert("expiry_time".into(), json!(expiry_after(days)));
    } else if args.never_expire {
        body.insert("expiry_time".into(), Value::Null);
    }

    if body.is_empty() {
        return Err(CliError::validation(
            "nothing to update; pass --uses-allowed, --unlimited-uses, --expiry-days or --never-expire",
        ));
    }
    Ok(body)
}

pub(crate) async fn handle_regtok_update(
    ctx: &AppContext,
    args: RegtokUpdateArgs,
) -> CliResult<()> {
    let body = update_body(&args)?;
    let updated = ctx
        .send(
            Method::PUT,
            ctx.admin_url(&["v1", "registration_tokens", &args.token])?,
            Some(&Value::Object(body)),
        )
        .await?;
    ctx.emit(&updated)
}

pub(crate) async fn handle_regtok_delete(ctx: &AppContext, args: RegtokArgs) -> CliResult<()> {
    if !ctx.confirm(&format!("Delete registration token {}?", args.token))? {
        return abort();
    }
    let response = ctx
        .send(
            Method::DELETE,
            ctx.admin_url(&["v1", "registration_tokens", &args.token])?,
            None,
        )
        .await?;
    ctx.emit_or_note(&response, &format!("Registration token {} deleted.", args.token))
}

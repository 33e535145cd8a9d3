use anyhow::anyhow;
use hsadmin_core::{Device, DeviceInventory, DevicePruneSelector, OnMalformed, RetentionPolicy};
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::cli::{
    PruneDevicesArgs, UserArgs, UserDeactivateArgs, UserListArgs, UserModifyArgs,
    UserPasswordArgs, UserSearchArgs,
};
use crate::client::{AppContext, CliError, CliResult, abort, prompt_secret, with_query};

pub(crate) async fn handle_user_list(ctx: &AppContext, args: UserListArgs) -> CliResult<()> {
    let guests = if args.guests {
        Some("true".to_string())
    } else if args.no_guests {
        Some("false".to_string())
    } else {
        None
    };
    let url = with_query(
        ctx.admin_url(&["v2", "users"])?,
        &[
            ("limit", args.limit.map(|limit| limit.to_string())),
            ("guests", guests),
            ("deactivated", args.deactivated.then(|| "true".to_string())),
            ("name", args.name),
            ("user_id", args.user_id),
        ],
    );
    let from = args.from.map(|from| from.to_string());

    if args.all {
        let users = ctx
            .walk_listing(&url, from.unwrap_or_default(), ("users", "next_token"), OnMalformed::Stop)
            .await?;
        let total = users.len();
        return ctx.emit(&json!({ "users": users, "total": total }));
    }

    let listing = ctx.get(with_query(url, &[("from", from)])).await?;
    ctx.emit(&listing)
}

pub(crate) async fn handle_user_search(ctx: &AppContext, args: UserSearchArgs) -> CliResult<()> {
    handle_user_list(
        ctx,
        UserListArgs {
            from: args.from,
            limit: args.limit,
            guests: true,
            deactivated: true,
            name: Some(args.term),
            ..UserListArgs::default()
        },
    )
    .await
}

pub(crate) async fn handle_user_details(ctx: &AppContext, args: UserArgs) -> CliResult<()> {
    let user = ctx.generate_mxid(&args.user).await?;
    let details = ctx.get(ctx.admin_url(&["v2", "users", &user])?).await?;
    ctx.emit(&details)
}

pub(crate) async fn handle_user_membership(ctx: &AppContext, args: UserArgs) -> CliResult<()> {
    let user = ctx.generate_mxid(&args.user).await?;
    let rooms = ctx
        .get(ctx.admin_url(&["v1", "users", &user, "joined_rooms"])?)
        .await?;
    ctx.emit(&rooms)
}

pub(crate) async fn handle_user_devices(ctx: &AppContext, args: UserArgs) -> CliResult<()> {
    let user = ctx.generate_mxid(&args.user).await?;
    let devices = ctx
        .get(ctx.admin_url(&["v2", "users", &user, "devices"])?)
        .await?;
    ctx.emit(&devices)
}

pub(crate) async fn handle_user_deactivate(
    ctx: &AppContext,
    args: UserDeactivateArgs,
) -> CliResult<()> {
    let user = ctx.generate_mxid(&args.user).await?;
    let question = if args.gdpr_erase {
        format!("Deactivate {user} and erase their data?")
    } else {
        format!("Deactivate {user}?")
    };
    if !ctx.confirm(&question)? {
        return abort();
    }

    let response = ctx
        .post(
            ctx.admin_url(&["v1", "deactivate", &user])?,
            &json!({ "erase": args.gdpr_erase }),
        )
        .await?;
    ctx.emit_or_note(&response, &format!("Deactivated {user}."))
}

pub(crate) async fn handle_user_password(
    ctx: &AppContext,
    args: UserPasswordArgs,
) -> CliResult<()> {
    let user = ctx.generate_mxid(&args.user).await?;
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret("New password: ", "--password")?,
    };

    let response = ctx
        .post(
            ctx.admin_url(&["v1", "reset_password", &user])?,
            &json!({ "new_password": password, "logout_devices": !args.no_logout }),
        )
        .await?;
    ctx.emit_or_note(&response, &format!("Password of {user} changed."))
}

pub(crate) async fn handle_user_modify(ctx: &AppContext, args: UserModifyArgs) -> CliResult<()> {
    let password = if args.password_prompt {
        Some(prompt_secret("New password: ", "--password")?)
    } else {
        args.password
    };
    let body = modify_body(
        password,
        args.display_name,
        &args.threepid,
        args.avatar_url,
        (args.admin, args.no_admin),
        (args.activate, args.deactivate),
    )?;

    let user = ctx.generate_mxid(&args.user).await?;
    let fields: Vec<&str> = body.keys().map(String::as_str).collect();
    if !ctx.confirm(&format!("Set {} of {user}?", fields.join(", ")))? {
        return abort();
    }

    let response = ctx
        .send(
            Method::PUT,
            ctx.admin_url(&["v2", "users", &user])?,
            Some(&Value::Object(body)),
        )
        .await?;
    ctx.emit(&response)
}

fn modify_body(
    password: Option<String>,
    display_name: Option<String>,
    threepids: &[String],
    avatar_url: Option<String>,
    admin: (bool, bool),
    activation: (bool, bool),
) -> CliResult<Map<String, Value>> {
    let mut body = Map::new();
    if let Some(password) = password {
        body.insert("password".into(), Value::String(password));
    }
    if let Some(display_name) = display_name {
        body.insert("displayname".into(), Value::String(display_name));
    }
    if !threepids.is_empty() {
        let pairs: Vec<Value> = threepids
            .chunks(2)
            .map(|pair| match pair {
                [medium, address] => Ok(json!({ "medium": medium, "address": address })),
                _ => Err(CliError::validation(
                    "--threepid takes a medium and an address",
                )),
            })
            .collect::<CliResult<_>>()?;
        body.insert("threepids".into(), Value::Array(pairs));
    }
    if let Some(avatar_url) = avatar_url {
        body.insert("avatar_url".into(), Value::String(avatar_url));
    }
    match admin {
        (true, true) => return Err(CliError::validation("--admin conflicts with --no-admin")),
        (true, false) => {
            body.insert("admin".into(), Value::Bool(true));
        }
        (false, true) => {
            body.insert("admin".into(), Value::Bool(false));
        }
        (false, false) => {}
    }
    match activation {
        (true, true) => {
            return Err(CliError::validation("--activate conflicts with --deactivate"));
        }
        (true, false) => {
            body.insert("deactivated".into(), Value::Bool(false));
        }
        (false, true) => {
            body.insert("deactivated".into(), Value::Bool(true));
        }
        (false, false) => {}
    }

    if body.is_empty() {
        return Err(CliError::validation("nothing to modify; pass at least one field"));
    }
    Ok(body)
}

/// Payload shown before deleting: the chosen devices and how many there are.
fn prune_report(selected: &[&Device]) -> Value {
    json!({ "devices": selected, "selected": selected.len() })
}

/// Select stale devices under the retention flags and delete them.
pub(crate) async fn handle_prune_devices(
    ctx: &AppContext,
    args: PruneDevicesArgs,
) -> CliResult<()> {
    if args.device_id.is_some() && args.min_days.is_some() {
        return Err(CliError::validation(
            "--device-id cannot be combined with --min-days",
        ));
    }

    let user = ctx.generate_mxid(&args.user).await?;
    let listing = ctx
        .get(ctx.admin_url(&["v2", "users", &user, "devices"])?)
        .await?;
    let inventory: DeviceInventory = serde_json::from_value(listing)
        .map_err(|err| CliError::failure(anyhow!("device listing of {user} is malformed: {err}")))?;

    let mut policy = RetentionPolicy::keeping(args.min_surviving);
    if let Some(days) = args.min_days {
        policy = policy.with_min_days(days);
    }
    if let Some(device_id) = args.device_id {
        policy = policy.targeting(device_id);
    }
    let selected = DevicePruneSelector::new(policy).select(&inventory);
    tracing::info!(
        user = %user,
        total = inventory.total,
        selected = selected.len(),
        "devices selected for pruning"
    );

    ctx.emit(&prune_report(&selected))?;
    if selected.is_empty() || args.list_only {
        return Ok(());
    }
    if !ctx.confirm(&format!("Delete {} device(s) of {user}?", selected.len()))? {
        return abort();
    }

    let device_ids: Vec<&str> = selected.iter().map(|device| device.device_id.as_str()).collect();
    ctx.post(
        ctx.admin_url(&["v2", "users", &user, "delete_devices"])?,
        &json!({ "devices": device_ids }),
    )
    .await?;
    eprintln!("Deleted {} device(s) of {user}.", device_ids.len());
    Ok(())
}

use chrono::Utc;
use hsadmin_core::MILLIS_PER_DAY;
use reqwest::Method;
use serde_json::json;

use crate::cli::{
    MediaDeleteArgs, MediaProtectArgs, MediaPurgeArgs, MediaQuarantineArgs, RoomArgs,
};
use crate::client::{AppContext, CliError, CliResult, abort, with_query};

/// Milliseconds timestamp `days` before now.
fn days_before_now(days: u32) -> i64 {
    Utc::now()
        .timestamp_millis()
        .saturating_sub(i64::from(days).saturating_mul(MILLIS_PER_DAY))
}

pub(crate) async fn handle_media_list(ctx: &AppContext, args: RoomArgs) -> CliResult<()> {
    let media = ctx
        .get(ctx.admin_url(&["v1", "room", &args.room, "media"])?)
        .await?;
    ctx.emit(&media)
}

pub(crate) async fn handle_media_quarantine(
    ctx: &AppContext,
    args: MediaQuarantineArgs,
) -> CliResult<()> {
    let url = match (args.media_id, args.room_id, args.user_id) {
        (Some(media_id), None, None) => {
            let server_name = match args.server_name {
                Some(name) => name,
                None => ctx.resolve_homeserver().await?,
            };
            ctx.admin_url(&["v1", "media", "quarantine", &server_name, &media_id])?
        }
        (None, Some(room_id), None) => {
            ctx.admin_url(&["v1", "room", &room_id, "media", "quarantine"])?
        }
        (None, None, Some(user)) => {
            let user = ctx.generate_mxid(&user).await?;
            ctx.admin_url(&["v1", "user", &user, "media", "quarantine"])?
        }
        _ => {
            return Err(CliError::validation(
                "pass exactly one of --media-id, --room-id or --user-id",
            ));
        }
    };

    let response = ctx.post(url, &json!({})).await?;
    ctx.emit_or_note(&response, "Media quarantined.")
}

pub(crate) async fn handle_media_protect(ctx: &AppContext, args: MediaProtectArgs) -> CliResult<()> {
    let response = ctx
        .post(
            ctx.admin_url(&["v1", "media", "protect", &args.media_id])?,
            &json!({}),
        )
        .await?;
    ctx.emit_or_note(&response, &format!("Media {} protected.", args.media_id))
}

/// What `media delete` removes.
enum DeleteTarget {
    Single(String),
    OlderThan(u32),
}

pub(crate) async fn handle_media_delete(ctx: &AppContext, args: MediaDeleteArgs) -> CliResult<()> {
    let target = match (args.media_id, args.before_days) {
        (Some(media_id), None) => DeleteTarget::Single(media_id),
        (None, Some(days)) => DeleteTarget::OlderThan(days),
        _ => {
            return Err(CliError::validation(
                "pass either --media-id or --before-days",
            ));
        }
    };
    let server_name = match args.server_name {
        Some(name) => name,
        None => ctx.resolve_homeserver().await?,
    };

    let (question, method, url) = match target {
        DeleteTarget::Single(media_id) => (
            format!("Delete media {media_id} from {server_name}?"),
            Method::DELETE,
            ctx.admin_url(&["v1", "media", &server_name, &media_id])?,
        ),
        DeleteTarget::OlderThan(days) => {
            let url = with_query(
                ctx.admin_url(&["v1", "media", &server_name, "delete"])?,
                &[
                    ("before_ts", Some(days_before_now(days).to_string())),
                    ("size_gt", args.size_gt.map(|size| size.to_string())),
                    (
                        "keep_profiles",
                        (args.no_keep_profiles && !args.keep_profiles)
                            .then(|| "false".to_string()),
                    ),
                ],
            );
            (
                format!("Delete local media of {server_name} older than {days} day(s)?"),
                Method::POST,
                url,
            )
        }
    };

    if !ctx.confirm(&question)? {
        return abort();
    }
    let response = ctx.send(method, url, Some(&json!({}))).await?;
    ctx.emit(&response)
}

pub(crate) async fn handle_media_purge(ctx: &AppContext, args: MediaPurgeArgs) -> CliResult<()> {
    if !ctx.confirm(&format!(
        "Purge cached remote media older than {} day(s)?",
        args.before_days
    ))? {
        return abort();
    }

    let url = with_query(
        ctx.admin_url(&["v1", "purge_media_cache"])?,
        &[("before_ts", Some(days_before_now(args.before_days).to_string()))],
    );
    let response = ctx.post(url, &json!({})).await?;
    ctx.emit(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;

    use crate::client::tests::context_with;

    #[tokio::test]
    async fn quarantine_single_media_uses_configured_server() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_synapse/admin/v1/media/quarantine/remote.example/abcdef");
            then.status(200).json_body(json!({}));
        });

        let ctx = context_with(&server)?;
        let args = MediaQuarantineArgs {
            media_id: Some("abcdef".into()),
            server_name: Some("remote.example".into()),
            ..MediaQuarantineArgs::default()
        };
        handle_media_quarantine(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn quarantine_user_media_expands_localpart() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_synapse/admin/v1/user/@spam:example.org/media/quarantine");
            then.status(200).json_body(json!({"num_quarantined": 3}));
        });

        let ctx = context_with(&server)?;
        let args = MediaQuarantineArgs {
            user_id: Some("spam".into()),
            ..MediaQuarantineArgs::default()
        };
        handle_media_quarantine(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn delete_by_age_sends_filters() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_synapse/admin/v1/media/example.org/delete")
                .query_param_exists("before_ts")
                .query_param("size_gt", "1048576")
                .query_param("keep_profiles", "false");
            then.status(200)
                .json_body(json!({"deleted_media": ["abc"], "total": 1}));
        });

        let ctx = context_with(&server)?;
        let args = MediaDeleteArgs {
            before_days: Some(90),
            size_gt: Some(1_048_576),
            no_keep_profiles: true,
            ..MediaDeleteArgs::default()
        };
        handle_media_delete(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn delete_single_media() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/_synapse/admin/v1/media/example.org/abcdef");
            then.status(200)
                .json_body(json!({"deleted_media": ["abcdef"], "total": 1}));
        });

        let ctx = context_with(&server)?;
        let args = MediaDeleteArgs {
            media_id: Some("abcdef".into()),
            ..MediaDeleteArgs::default()
        };
        handle_media_delete(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn delete_without_selector_is_rejected_before_any_request() -> Result<()> {
        let server = MockServer::start_async().await;
        let keys = server.mock(|when, then| {
            when.method(GET).path("/_matrix/key/v2/server");
            then.status(200).json_body(json!({"server_name": "example.org"}));
        });

        let mut ctx = context_with(&server)?;
        ctx.homeserver = None;
        let err = handle_media_delete(&ctx, MediaDeleteArgs::default())
            .await
            .err()
            .ok_or_else(|| anyhow!("expected validation error"))?;
        assert_eq!(err.exit_code(), 2);
        keys.assert_hits(0);
        Ok(())
    }

    #[test]
    fn days_before_now_moves_back_whole_days() {
        let now = Utc::now().timestamp_millis();
        let earlier = days_before_now(2);
        let delta = now - earlier;
        assert!((2 * MILLIS_PER_DAY - 1_000..=2 * MILLIS_PER_DAY).contains(&delta));
    }
}

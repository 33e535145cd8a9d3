use chrono::{NaiveDate, NaiveDateTime, Utc};
use hsadmin_core::MILLIS_PER_DAY;
use serde_json::{Map, Value, json};

use crate::cli::{HistoryPurgeArgs, HistoryPurgeStatusArgs};
use crate::client::{AppContext, CliError, CliResult, abort};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse `--before` as a UTC date or date-time into milliseconds since epoch.
fn parse_before(input: &str) -> CliResult<i64> {
    let input = input.trim();
    let parsed = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            CliError::validation(format!(
                "'{input}' is not a date (YYYY-MM-DD) or date-time (YYYY-MM-DD HH:MM:SS)"
            ))
        })?;
    Ok(parsed.and_utc().timestamp_millis())
}

/// Request body for a history purge; exactly one cut-off must be given.
fn purge_body(args: &HistoryPurgeArgs) -> CliResult<Map<String, Value>> {
    let mut body = Map::new();
    body.insert("delete_local_events".into(), Value::Bool(args.delete_local));

    let cutoff_ts = match (&args.before_event_id, args.before_days, &args.before, args.before_ts) {
        (Some(event_id), None, None, None) => {
            body.insert("purge_up_to_event_id".into(), Value::String(event_id.clone()));
            return Ok(body);
        }
        (None, Some(days), None, None) => Utc::now()
            .timestamp_millis()
            .saturating_sub(i64::from(days).saturating_mul(MILLIS_PER_DAY)),
        (None, None, Some(before), None) => parse_before(before)?,
        (None, None, None, Some(ts)) => ts,
        _ => {
            return Err(CliError::validation(
                "pass exactly one of --before-event-id, --before-days, --before or --before-ts",
            ));
        }
    };
    body.insert("purge_up_to_ts".into(), json!(cutoff_ts));
    Ok(body)
}

pub(crate) async fn handle_history_purge(
    ctx: &AppContext,
    args: HistoryPurgeArgs,
) -> CliResult<()> {
    let body = purge_body(&args)?;
    if !ctx.confirm(&format!("Purge history of room {}?", args.room))? {
        return abort();
    }

    let response = ctx
        .post(
            ctx.admin_url(&["v1", "purge_history", &args.room])?,
            &Value::Object(body),
        )
        .await?;
    if let Some(purge_id) = response.get("purge_id").and_then(Value::as_str) {
        eprintln!("Use 'hsadmin history purge-status {purge_id}' to follow the purge.");
    }
    ctx.emit(&response)
}

pub(crate) async fn handle_history_purge_status(
    ctx: &AppContext,
    args: HistoryPurgeStatusArgs,
) -> CliResult<()> {
    let status = ctx
        .get(ctx.admin_url(&["v1", "purge_history_status", &args.purge_id])?)
        .await?;
    ctx.emit(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;

    use crate::client::tests::context_with;

    fn purge_args() -> HistoryPurgeArgs {
        HistoryPurgeArgs {
            room: "!abc:example.org".into(),
            ..HistoryPurgeArgs::default()
        }
    }

    #[tokio::test]
    async fn purge_up_to_event_sends_event_id() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_synapse/admin/v1/purge_history/!abc:example.org")
                .json_body(json!({
                    "delete_local_events": true,
                    "purge_up_to_event_id": "$event:example.org"
                }));
            then.status(200).json_body(json!({"purge_id": "wbRLakhdrNqwfkTq"}));
        });

        let ctx = context_with(&server)?;
        let args = HistoryPurgeArgs {
            before_event_id: Some("$event:example.org".into()),
            delete_local: true,
            ..purge_args()
        };
        handle_history_purge(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn purge_before_date_sends_timestamp() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/_synapse/admin/v1/purge_history/!abc:example.org")
                .json_body(json!({
                    "delete_local_events": false,
                    "purge_up_to_ts": 1_609_459_200_000_i64
                }));
            then.status(200).json_body(json!({"purge_id": "wbRLakhdrNqwfkTq"}));
        });

        let ctx = context_with(&server)?;
        let args = HistoryPurgeArgs {
            before: Some("2021-01-01".into()),
            ..purge_args()
        };
        handle_history_purge(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[test]
    fn before_accepts_date_times() -> Result<()> {
        assert_eq!(
            parse_before("2021-01-01 12:00:00").map_err(|err| anyhow!(err.display_message()))?,
            1_609_502_400_000
        );
        assert_eq!(
            parse_before("2021-01-01T12:00:00").map_err(|err| anyhow!(err.display_message()))?,
            1_609_502_400_000
        );
        assert!(parse_before("yesterday").is_err());
        Ok(())
    }

    #[test]
    fn purge_needs_exactly_one_cutoff() -> Result<()> {
        let none = purge_body(&purge_args())
            .err()
            .ok_or_else(|| anyhow!("expected validation error"))?;
        assert_eq!(none.exit_code(), 2);

        let two = HistoryPurgeArgs {
            before_days: Some(30),
            before_ts: Some(1),
            ..purge_args()
        };
        assert!(purge_body(&two).is_err());

        let days = HistoryPurgeArgs {
            before_days: Some(30),
            ..purge_args()
        };
        let body = purge_body(&days).map_err(|err| anyhow!(err.display_message()))?;
        let cutoff = body["purge_up_to_ts"]
            .as_i64()
            .ok_or_else(|| anyhow!("purge_up_to_ts missing"))?;
        assert!(cutoff <= Utc::now().timestamp_millis() - 30 * MILLIS_PER_DAY);
        Ok(())
    }

    #[tokio::test]
    async fn purge_status_is_fetched() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v1/purge_history_status/wbRLakhdrNqwfkTq");
            then.status(200).json_body(json!({"status": "active"}));
        });

        let ctx = context_with(&server)?;
        handle_history_purge_status(
            &ctx,
            HistoryPurgeStatusArgs {
                purge_id: "wbRLakhdrNqwfkTq".into(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }
}

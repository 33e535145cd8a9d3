use hsadmin_core::OnMalformed;
use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::cli::{RoomArgs, RoomDeleteArgs, RoomListArgs, RoomSearchArgs};
use crate::client::{AppContext, CliResult, abort, with_query};

pub(crate) async fn handle_room_list(ctx: &AppContext, args: RoomListArgs) -> CliResult<()> {
    let url = with_query(
        ctx.admin_url(&["v1", "rooms"])?,
        &[
            ("limit", args.limit.map(|limit| limit.to_string())),
            ("search_term", args.name),
            ("order_by", args.sort),
            ("dir", args.reverse.then(|| "b".to_string())),
        ],
    );
    let from = args.from.map(|from| from.to_string());

    if args.all {
        let rooms = ctx
            .walk_listing(&url, from.unwrap_or_default(), ("rooms", "next_batch"), OnMalformed::Stop)
            .await?;
        let total = rooms.len();
        return ctx.emit(&json!({ "rooms": rooms, "total_rooms": total }));
    }

    let listing = ctx.get(with_query(url, &[("from", from)])).await?;
    ctx.emit(&listing)
}

pub(crate) async fn handle_room_search(ctx: &AppContext, args: RoomSearchArgs) -> CliResult<()> {
    handle_room_list(
        ctx,
        RoomListArgs {
            from: args.from,
            limit: args.limit,
            name: Some(args.term),
            sort: args.sort,
            reverse: args.reverse,
            all: false,
        },
    )
    .await
}

pub(crate) async fn handle_room_details(ctx: &AppContext, args: RoomArgs) -> CliResult<()> {
    let details = ctx.get(ctx.admin_url(&["v1", "rooms", &args.room])?).await?;
    ctx.emit(&details)
}

pub(crate) async fn handle_room_members(ctx: &AppContext, args: RoomArgs) -> CliResult<()> {
    let members = ctx
        .get(ctx.admin_url(&["v1", "rooms", &args.room, "members"])?)
        .await?;
    ctx.emit(&members)
}

pub(crate) async fn handle_room_delete(ctx: &AppContext, args: RoomDeleteArgs) -> CliResult<()> {
    let mut body = Map::new();
    body.insert("block".into(), Value::Bool(args.block));
    body.insert("purge".into(), Value::Bool(!args.no_purge));
    if let Some(user) = args.new_room_user_id {
        body.insert("new_room_user_id".into(), Value::String(user));
    }
    if let Some(name) = args.room_name {
        body.insert("room_name".into(), Value::String(name));
    }
    if let Some(message) = args.message {
        body.insert("message".into(), Value::String(message));
    }

    let question = if args.no_purge {
        format!("Delete room {}?", args.room)
    } else {
        format!("Delete and purge room {}?", args.room)
    };
    if !ctx.confirm(&question)? {
        return abort();
    }

    let response = ctx
        .send(
            Method::DELETE,
            ctx.admin_url(&["v2", "rooms", &args.room])?,
            Some(&Value::Object(body)),
        )
        .await?;
    ctx.emit(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;

    use crate::client::tests::context_with;

    #[tokio::test]
    async fn room_list_maps_filters_to_query() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v1/rooms")
                .query_param("from", "20")
                .query_param("limit", "10")
                .query_param("order_by", "joined_members")
                .query_param("dir", "b");
            then.status(200)
                .json_body(json!({"rooms": [], "offset": 20, "total_rooms": 20}));
        });

        let ctx = context_with(&server)?;
        let args = RoomListArgs {
            from: Some(20),
            limit: Some(10),
            sort: Some("joined_members".into()),
            reverse: true,
            ..RoomListArgs::default()
        };
        handle_room_list(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn room_list_all_follows_numeric_next_batch() -> Result<()> {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v1/rooms")
                .query_param("search_term", "lobby")
                .query_param("from", "0");
            then.status(200).json_body(json!({
                "rooms": [{"room_id": "!a:example.org"}],
                "next_batch": 1,
                "total_rooms": 2
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v1/rooms")
                .query_param("search_term", "lobby")
                .query_param("from", "1");
            then.status(200).json_body(json!({
                "rooms": [{"room_id": "!b:example.org"}],
                "total_rooms": 2
            }));
        });

        let ctx = context_with(&server)?;
        let args = RoomListArgs {
            from: Some(0),
            name: Some("lobby".into()),
            all: true,
            ..RoomListArgs::default()
        };
        handle_room_list(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        first.assert();
        second.assert();
        Ok(())
    }

    #[tokio::test]
    async fn room_members_are_fetched() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/_synapse/admin/v1/rooms/!abc:example.org/members");
            then.status(200)
                .json_body(json!({"members": ["@a:example.org"], "total": 1}));
        });

        let ctx = context_with(&server)?;
        handle_room_members(
            &ctx,
            RoomArgs {
                room: "!abc:example.org".into(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn room_delete_sends_only_given_options() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/_synapse/admin/v2/rooms/!abc:example.org")
                .json_body(json!({"block": true, "purge": true, "message": "closed"}));
            then.status(200).json_body(json!({"delete_id": "abcdef"}));
        });

        let ctx = context_with(&server)?;
        let args = RoomDeleteArgs {
            room: "!abc:example.org".into(),
            message: Some("closed".into()),
            block: true,
            ..RoomDeleteArgs::default()
        };
        handle_room_delete(&ctx, args)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();
        Ok(())
    }
}

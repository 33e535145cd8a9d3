//! Argument parsing and command dispatch for the CLI.

use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use hsadmin_config::{OutputFormat, default_config_path, expand_home, load_or_default};
use hsadmin_telemetry::{LogFormat, LoggingConfig, init_logging, level_for_verbosity};
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::config::{config_error, handle_config};
use crate::commands::history::{handle_history_purge, handle_history_purge_status};
use crate::commands::matrix::handle_matrix_raw;
use crate::commands::media::{
    handle_media_delete, handle_media_list, handle_media_protect, handle_media_purge,
    handle_media_quarantine,
};
use crate::commands::notice::handle_notice_send;
use crate::commands::regtok::{
    handle_regtok_delete, handle_regtok_details, handle_regtok_list, handle_regtok_new,
    handle_regtok_update,
};
use crate::commands::room::{
    handle_room_delete, handle_room_details, handle_room_list, handle_room_members,
    handle_room_search,
};
use crate::commands::server::{handle_raw, handle_version};
use crate::commands::user::{
    handle_prune_devices, handle_user_deactivate, handle_user_details, handle_user_devices,
    handle_user_list, handle_user_membership, handle_user_modify, handle_user_password,
    handle_user_search,
};

/// Parses CLI arguments, executes the requested command, and reports
/// failures on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: level_for_verbosity(cli.verbose),
        format: cli.log_format,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    tracing::debug!(command = command_name, trace_id = %trace_id, "dispatching command");

    match dispatch(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            let exit_code = err.exit_code();
            tracing::debug!(command = command_name, exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let config_path = resolve_config_path(cli.config_file)?;
    let mut config = load_or_default(&config_path).map_err(config_error)?;
    if let Some(timeout) = cli.timeout {
        config.timeout = timeout;
    }

    match cli.command {
        Command::Config(args) => handle_config(&config_path, config, args, cli.output),
        Command::Api(command) => {
            let format = cli.output.unwrap_or(config.format);
            let ctx = AppContext::from_config(&config, format, cli.batch, trace_id)?;
            dispatch_api(&ctx, command).await
        }
    }
}

async fn dispatch_api(ctx: &AppContext, command: ApiCommand) -> CliResult<()> {
    match command {
        ApiCommand::Version => handle_version(ctx).await,
        ApiCommand::Raw(args) => handle_raw(ctx, args).await,
        ApiCommand::User(user) => match user {
            UserCommand::List(args) => handle_user_list(ctx, args).await,
            UserCommand::Search(args) => handle_user_search(ctx, args).await,
            UserCommand::Details(args) => handle_user_details(ctx, args).await,
            UserCommand::Membership(args) => handle_user_membership(ctx, args).await,
            UserCommand::Deactivate(args) => handle_user_deactivate(ctx, args).await,
            UserCommand::Password(args) => handle_user_password(ctx, args).await,
            UserCommand::Modify(args) => handle_user_modify(ctx, args).await,
            UserCommand::Devices(args) => handle_user_devices(ctx, args).await,
            UserCommand::PruneDevices(args) => handle_prune_devices(ctx, args).await,
        },
        ApiCommand::Room(room) => match room {
            RoomCommand::List(args) => handle_room_list(ctx, args).await,
            RoomCommand::Search(args) => handle_room_search(ctx, args).await,
            RoomCommand::Details(args) => handle_room_details(ctx, args).await,
            RoomCommand::Members(args) => handle_room_members(ctx, args).await,
            RoomCommand::Delete(args) => handle_room_delete(ctx, args).await,
        },
        ApiCommand::Media(media) => match media {
            MediaCommand::List(args) => handle_media_list(ctx, args).await,
            MediaCommand::Quarantine(args) => handle_media_quarantine(ctx, args).await,
            MediaCommand::Protect(args) => handle_media_protect(ctx, args).await,
            MediaCommand::Delete(args) => handle_media_delete(ctx, args).await,
            MediaCommand::Purge(args) => handle_media_purge(ctx, args).await,
        },
        ApiCommand::Regtok(regtok) => match regtok {
            RegtokCommand::List(args) => handle_regtok_list(ctx, args).await,
            RegtokCommand::Details(args) => handle_regtok_details(ctx, args).await,
            RegtokCommand::New(args) => handle_regtok_new(ctx, args).await,
            RegtokCommand::Update(args) => handle_regtok_update(ctx, args).await,
            RegtokCommand::Delete(args) => handle_regtok_delete(ctx, args).await,
        },
        ApiCommand::Notice(NoticeCommand::Send(args)) => handle_notice_send(ctx, args).await,
        ApiCommand::History(history) => match history {
            HistoryCommand::Purge(args) => handle_history_purge(ctx, args).await,
            HistoryCommand::PurgeStatus(args) => handle_history_purge_status(ctx, args).await,
        },
        ApiCommand::Matrix(MatrixCommand::Raw(args)) => handle_matrix_raw(ctx, args).await,
    }
}

fn resolve_config_path(flag: Option<PathBuf>) -> CliResult<PathBuf> {
    flag.map(|path| expand_home(&path))
        .or_else(default_config_path)
        .ok_or_else(|| {
            CliError::validation(
                "cannot determine the configuration directory; pass --config-file",
            )
        })
}

fn parse_output_format(input: &str) -> Result<OutputFormat, String> {
    input.parse::<OutputFormat>().map_err(|err| err.to_string())
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse::<LogFormat>().map_err(|err| err.to_string())
}

#[derive(Parser)]
#[command(
    name = "hsadmin",
    version,
    about = "Administrative CLI for Synapse-compatible homeservers"
)]
pub(crate) struct Cli {
    #[arg(
        short = 'c',
        long,
        global = true,
        env = "HSADMIN_CONFIG",
        help = "Configuration file (defaults to <config dir>/hsadmin.yaml)"
    )]
    config_file: Option<PathBuf>,
    #[arg(
        short = 'o',
        long = "output",
        alias = "format",
        global = true,
        value_parser = parse_output_format,
        help = "Output format: yaml, json, minified or human (prefixes accepted)"
    )]
    output: Option<OutputFormat>,
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u8,
    #[arg(long, global = true, help = "Never prompt; assume yes")]
    batch: bool,
    #[arg(
        long,
        global = true,
        env = "HSADMIN_HTTP_TIMEOUT_SECS",
        help = "HTTP timeout in seconds"
    )]
    timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        default_value = "compact",
        value_parser = parse_log_format,
        help = "Log format: pretty, compact or json"
    )]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Write the configuration file.
    Config(ConfigArgs),
    #[command(flatten)]
    Api(ApiCommand),
}

/// Commands that talk to the homeserver.
#[derive(Subcommand)]
pub(crate) enum ApiCommand {
    /// Show the homeserver version.
    Version,
    /// Manage user accounts.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage rooms.
    #[command(subcommand)]
    Room(RoomCommand),
    /// Manage media.
    #[command(subcommand)]
    Media(MediaCommand),
    /// Manage registration tokens.
    #[command(subcommand)]
    Regtok(RegtokCommand),
    /// Send server notices.
    #[command(subcommand)]
    Notice(NoticeCommand),
    /// Purge historic room events.
    #[command(subcommand)]
    History(HistoryCommand),
    /// Issue Matrix client-server API requests.
    #[command(subcommand)]
    Matrix(MatrixCommand),
    /// Issue an arbitrary admin API request.
    Raw(RawArgs),
}

#[derive(Subcommand)]
pub(crate) enum UserCommand {
    /// List users.
    List(UserListArgs),
    /// Search users by name.
    Search(UserSearchArgs),
    /// Show account details.
    Details(UserArgs),
    /// List rooms the user has joined.
    Membership(UserArgs),
    /// Deactivate an account.
    Deactivate(UserDeactivateArgs),
    /// Reset a password.
    Password(UserPasswordArgs),
    /// Create or modify an account.
    Modify(UserModifyArgs),
    /// List the user's devices.
    Devices(UserArgs),
    /// Delete stale devices while keeping a minimum number alive.
    PruneDevices(PruneDevicesArgs),
}

#[derive(Subcommand)]
pub(crate) enum RoomCommand {
    /// List rooms.
    List(RoomListArgs),
    /// Search rooms by name.
    Search(RoomSearchArgs),
    /// Show room details.
    Details(RoomArgs),
    /// List room members.
    Members(RoomArgs),
    /// Delete a room.
    Delete(RoomDeleteArgs),
}

#[derive(Subcommand)]
pub(crate) enum MediaCommand {
    /// List media known in a room.
    List(RoomArgs),
    /// Quarantine one media item, a room's media or a user's media.
    Quarantine(MediaQuarantineArgs),
    /// Protect a media item from quarantine.
    Protect(MediaProtectArgs),
    /// Delete local media by id or by age and size.
    Delete(MediaDeleteArgs),
    /// Purge cached remote media.
    Purge(MediaPurgeArgs),
}

#[derive(Subcommand)]
pub(crate) enum RegtokCommand {
    /// List registration tokens.
    List(RegtokListArgs),
    /// Show one registration token.
    Details(RegtokArgs),
    /// Create a registration token.
    New(RegtokNewArgs),
    /// Update a registration token.
    Update(RegtokUpdateArgs),
    /// Delete a registration token.
    Delete(RegtokArgs),
}

#[derive(Subcommand)]
pub(crate) enum NoticeCommand {
    /// Send a server notice to one user or every user matching a pattern.
    Send(NoticeSendArgs),
}

#[derive(Subcommand)]
pub(crate) enum HistoryCommand {
    /// Purge room events before a point in time or an event.
    Purge(HistoryPurgeArgs),
    /// Show the state of a running purge.
    PurgeStatus(HistoryPurgeStatusArgs),
}

#[derive(Subcommand)]
pub(crate) enum MatrixCommand {
    /// Issue an arbitrary request below the Matrix API path.
    Raw(MatrixRawArgs),
}

#[derive(Args, Default)]
pub(crate) struct ConfigArgs {
    #[arg(short = 'u', long, help = "Admin user id")]
    pub(crate) user: Option<String>,
    #[arg(short = 't', long, help = "Admin access token")]
    pub(crate) token: Option<String>,
    #[arg(short = 'b', long, help = "Homeserver base URL")]
    pub(crate) base_url: Option<String>,
    #[arg(long, help = "Admin API path prefix")]
    pub(crate) admin_path: Option<String>,
    #[arg(long, help = "Matrix API path prefix")]
    pub(crate) matrix_path: Option<String>,
    #[arg(long, help = "Verify TLS certificates")]
    pub(crate) ssl_verify: Option<bool>,
    #[arg(long, help = "Server name used to build user ids")]
    pub(crate) homeserver: Option<String>,
    #[arg(long, help = "Print the stored configuration instead of writing it")]
    pub(crate) show: bool,
}

#[derive(Args)]
pub(crate) struct UserArgs {
    #[arg(help = "User id or localpart")]
    pub(crate) user: String,
}

#[derive(Args, Default)]
pub(crate) struct UserListArgs {
    #[arg(long, help = "Offset to start listing from")]
    pub(crate) from: Option<u64>,
    #[arg(long, help = "Maximum users per page")]
    pub(crate) limit: Option<u64>,
    #[arg(long, conflicts_with = "no_guests", help = "Include guest users")]
    pub(crate) guests: bool,
    #[arg(long, help = "Exclude guest users")]
    pub(crate) no_guests: bool,
    #[arg(long, help = "Include deactivated users")]
    pub(crate) deactivated: bool,
    #[arg(long, conflicts_with = "user_id", help = "Filter by user id or display name")]
    pub(crate) name: Option<String>,
    #[arg(long, help = "Filter by user id")]
    pub(crate) user_id: Option<String>,
    #[arg(long, help = "Follow continuation tokens until every page is read")]
    pub(crate) all: bool,
}

#[derive(Args)]
pub(crate) struct UserSearchArgs {
    #[arg(help = "Text matched against user ids and display names")]
    pub(crate) term: String,
    #[arg(long)]
    pub(crate) from: Option<u64>,
    #[arg(long)]
    pub(crate) limit: Option<u64>,
}

#[derive(Args)]
pub(crate) struct UserDeactivateArgs {
    #[arg(help = "User id or localpart")]
    pub(crate) user: String,
    #[arg(long, help = "Also erase the user's data")]
    pub(crate) gdpr_erase: bool,
}

#[derive(Args)]
pub(crate) struct UserPasswordArgs {
    #[arg(help = "User id or localpart")]
    pub(crate) user: String,
    #[arg(long, help = "New password (prompted when omitted)")]
    pub(crate) password: Option<String>,
    #[arg(long, help = "Keep the user's sessions logged in")]
    pub(crate) no_logout: bool,
}

#[derive(Args, Default)]
#[command(group(ArgGroup::new("admin_flag").args(["admin", "no_admin"])))]
#[command(group(ArgGroup::new("activation").args(["activate", "deactivate"])))]
pub(crate) struct UserModifyArgs {
    #[arg(help = "User id or localpart")]
    pub(crate) user: String,
    #[arg(long, help = "New password")]
    pub(crate) password: Option<String>,
    #[arg(long, conflicts_with = "password", help = "Prompt for the new password")]
    pub(crate) password_prompt: bool,
    #[arg(long, help = "Display name")]
    pub(crate) display_name: Option<String>,
    #[arg(
        long,
        num_args = 2,
        value_names = ["MEDIUM", "ADDRESS"],
        help = "Third-party id, e.g. --threepid email alice@example.org (repeatable)"
    )]
    pub(crate) threepid: Vec<String>,
    #[arg(long, help = "Avatar mxc:// URL")]
    pub(crate) avatar_url: Option<String>,
    #[arg(long, help = "Grant server admin")]
    pub(crate) admin: bool,
    #[arg(long, help = "Revoke server admin")]
    pub(crate) no_admin: bool,
    #[arg(long, help = "Reactivate the account")]
    pub(crate) activate: bool,
    #[arg(long, help = "Deactivate the account")]
    pub(crate) deactivate: bool,
}

#[derive(Args, Default)]
pub(crate) struct PruneDevicesArgs {
    #[arg(help = "User id or localpart")]
    pub(crate) user: String,
    #[arg(long, help = "Keep devices seen within this many days")]
    pub(crate) min_days: Option<u32>,
    #[arg(long, default_value_t = 1, help = "Always keep at least this many devices")]
    pub(crate) min_surviving: u64,
    #[arg(long, help = "Delete only this device")]
    pub(crate) device_id: Option<String>,
    #[arg(long, help = "Show the selection without deleting anything")]
    pub(crate) list_only: bool,
}

#[derive(Args)]
pub(crate) struct RoomArgs {
    #[arg(help = "Room id")]
    pub(crate) room: String,
}

#[derive(Args, Default)]
pub(crate) struct RoomListArgs {
    #[arg(long, help = "Offset to start listing from")]
    pub(crate) from: Option<u64>,
    #[arg(long, help = "Maximum rooms per page")]
    pub(crate) limit: Option<u64>,
    #[arg(long, help = "Filter by room name")]
    pub(crate) name: Option<String>,
    #[arg(long, help = "Sort key, e.g. name, joined_members, state_events")]
    pub(crate) sort: Option<String>,
    #[arg(long, help = "Reverse the sort order")]
    pub(crate) reverse: bool,
    #[arg(long, help = "Follow continuation tokens until every page is read")]
    pub(crate) all: bool,
}

#[derive(Args)]
pub(crate) struct RoomSearchArgs {
    #[arg(help = "Text matched against room names")]
    pub(crate) term: String,
    #[arg(long)]
    pub(crate) from: Option<u64>,
    #[arg(long)]
    pub(crate) limit: Option<u64>,
    #[arg(long)]
    pub(crate) sort: Option<String>,
    #[arg(long)]
    pub(crate) reverse: bool,
}

#[derive(Args, Default)]
pub(crate) struct RoomDeleteArgs {
    #[arg(help = "Room id")]
    pub(crate) room: String,
    #[arg(long, help = "Move local members to a new room created by this user")]
    pub(crate) new_room_user_id: Option<String>,
    #[arg(long, help = "Name of the replacement room")]
    pub(crate) room_name: Option<String>,
    #[arg(long, help = "Message posted in the replacement room")]
    pub(crate) message: Option<String>,
    #[arg(long, help = "Block the room id from being joined again")]
    pub(crate) block: bool,
    #[arg(long, help = "Keep the room's history in the database")]
    pub(crate) no_purge: bool,
}

#[derive(Args, Default)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["media_id", "room_id", "user_id"])
))]
pub(crate) struct MediaQuarantineArgs {
    #[arg(long, requires = "server_name", help = "Media id to quarantine")]
    pub(crate) media_id: Option<String>,
    #[arg(long, help = "Server the media originates from")]
    pub(crate) server_name: Option<String>,
    #[arg(long, help = "Quarantine all media in this room")]
    pub(crate) room_id: Option<String>,
    #[arg(long, help = "Quarantine all media uploaded by this user")]
    pub(crate) user_id: Option<String>,
}

#[derive(Args)]
pub(crate) struct MediaProtectArgs {
    #[arg(help = "Media id")]
    pub(crate) media_id: String,
}

#[derive(Args, Default)]
pub(crate) struct MediaDeleteArgs {
    #[arg(long, conflicts_with = "before_days", help = "Delete this media id")]
    pub(crate) media_id: Option<String>,
    #[arg(long, help = "Server the media belongs to (defaults to this homeserver)")]
    pub(crate) server_name: Option<String>,
    #[arg(long, help = "Delete media last accessed this many days ago or earlier")]
    pub(crate) before_days: Option<u32>,
    #[arg(long, requires = "before_days", help = "Only delete media larger than this many bytes")]
    pub(crate) size_gt: Option<u64>,
    #[arg(long, conflicts_with = "keep_profiles", help = "Also delete avatars")]
    pub(crate) no_keep_profiles: bool,
    #[arg(long, help = "Keep avatars (default)")]
    pub(crate) keep_profiles: bool,
}

#[derive(Args)]
pub(crate) struct MediaPurgeArgs {
    #[arg(long, help = "Purge cached remote media older than this many days")]
    pub(crate) before_days: u32,
}

#[derive(Args, Default)]
pub(crate) struct RegtokListArgs {
    #[arg(long, conflicts_with = "invalid", help = "Only tokens that can still be used")]
    pub(crate) valid: bool,
    #[arg(long, help = "Only expired or used-up tokens")]
    pub(crate) invalid: bool,
}

#[derive(Args)]
pub(crate) struct RegtokArgs {
    #[arg(help = "Registration token")]
    pub(crate) token: String,
}

#[derive(Args, Default)]
pub(crate) struct RegtokNewArgs {
    #[arg(long, help = "Token text (generated by the server when omitted)")]
    pub(crate) token: Option<String>,
    #[arg(long, conflicts_with = "token", help = "Length of a generated token")]
    pub(crate) length: Option<u32>,
    #[arg(long, help = "Number of registrations allowed (unlimited when omitted)")]
    pub(crate) uses_allowed: Option<u64>,
    #[arg(long, help = "Days until the token expires (never when omitted)")]
    pub(crate) expiry_days: Option<u32>,
}

#[derive(Args, Default)]
pub(crate) struct RegtokUpdateArgs {
    #[arg(help = "Registration token")]
    pub(crate) token: String,
    #[arg(long, conflicts_with = "unlimited_uses")]
    pub(crate) uses_allowed: Option<u64>,
    #[arg(long, help = "Remove the usage limit")]
    pub(crate) unlimited_uses: bool,
    #[arg(long, conflicts_with = "never_expire")]
    pub(crate) expiry_days: Option<u32>,
    #[arg(long, help = "Remove the expiry time")]
    pub(crate) never_expire: bool,
}

#[derive(Args, Default)]
pub(crate) struct NoticeSendArgs {
    #[arg(help = "Recipient user id, or a regular expression matched against every user id")]
    pub(crate) to: String,
    #[arg(help = "Plain-text body")]
    pub(crate) plain: String,
    #[arg(help = "HTML body")]
    pub(crate) formatted: Option<String>,
    #[arg(long, help = "Read PLAIN and FORMATTED from the named files")]
    pub(crate) from_file: bool,
    #[arg(long, default_value_t = 100, help = "Users fetched per page when matching")]
    pub(crate) page_size: u64,
}

#[derive(Args, Default)]
pub(crate) struct RawArgs {
    #[arg(help = "Endpoint below the API path, e.g. v1/server_version")]
    pub(crate) endpoint: String,
    #[arg(short = 'X', long, default_value = "get")]
    pub(crate) method: String,
    #[arg(short = 'd', long, help = "JSON request body")]
    pub(crate) data: Option<String>,
    #[arg(long, conflicts_with = "data", help = "File holding the JSON request body")]
    pub(crate) data_file: Option<PathBuf>,
}

#[derive(Args, Default)]
#[command(group(
    ArgGroup::new("cutoff")
        .required(true)
        .args(["before_event_id", "before_days", "before", "before_ts"])
))]
pub(crate) struct HistoryPurgeArgs {
    #[arg(help = "Room id")]
    pub(crate) room: String,
    #[arg(short = 'i', long, help = "Purge events before this event id")]
    pub(crate) before_event_id: Option<String>,
    #[arg(short = 'd', long, help = "Purge events older than this many days")]
    pub(crate) before_days: Option<u32>,
    #[arg(long, help = "Purge events before this UTC date or date-time, e.g. 2021-01-01")]
    pub(crate) before: Option<String>,
    #[arg(long, help = "Purge events before this timestamp in milliseconds")]
    pub(crate) before_ts: Option<i64>,
    #[arg(long, help = "Also delete events sent by local users")]
    pub(crate) delete_local: bool,
}

#[derive(Args)]
pub(crate) struct HistoryPurgeStatusArgs {
    #[arg(help = "Purge id returned by history purge")]
    pub(crate) purge_id: String,
}

#[derive(Args, Default)]
pub(crate) struct MatrixRawArgs {
    #[command(flatten)]
    pub(crate) request: RawArgs,
    #[arg(
        short = 't',
        long,
        env = "MTOKEN",
        hide_env_values = true,
        help = "Act with this user token instead of the admin token"
    )]
    pub(crate) token: Option<String>,
    #[arg(short = 'p', long, help = "Prompt for the user token")]
    pub(crate) prompt: bool,
}

const fn command_label(command: &Command) -> &'static str {
    let api = match command {
        Command::Config(_) => return "config",
        Command::Api(api) => api,
    };
    match api {
        ApiCommand::Version => "version",
        ApiCommand::Raw(_) => "raw",
        ApiCommand::User(user) => match user {
            UserCommand::List(_) => "user_list",
            UserCommand::Search(_) => "user_search",
            UserCommand::Details(_) => "user_details",
            UserCommand::Membership(_) => "user_membership",
            UserCommand::Deactivate(_) => "user_deactivate",
            UserCommand::Password(_) => "user_password",
            UserCommand::Modify(_) => "user_modify",
            UserCommand::Devices(_) => "user_devices",
            UserCommand::PruneDevices(_) => "user_prune_devices",
        },
        ApiCommand::Room(room) => match room {
            RoomCommand::List(_) => "room_list",
            RoomCommand::Search(_) => "room_search",
            RoomCommand::Details(_) => "room_details",
            RoomCommand::Members(_) => "room_members",
            RoomCommand::Delete(_) => "room_delete",
        },
        ApiCommand::Media(media) => match media {
            MediaCommand::List(_) => "media_list",
            MediaCommand::Quarantine(_) => "media_quarantine",
            MediaCommand::Protect(_) => "media_protect",
            MediaCommand::Delete(_) => "media_delete",
            MediaCommand::Purge(_) => "media_purge",
        },
        ApiCommand::Regtok(regtok) => match regtok {
            RegtokCommand::List(_) => "regtok_list",
            RegtokCommand::Details(_) => "regtok_details",
            RegtokCommand::New(_) => "regtok_new",
            RegtokCommand::Update(_) => "regtok_update",
            RegtokCommand::Delete(_) => "regtok_delete",
        },
        ApiCommand::Notice(NoticeCommand::Send(_)) => "notice_send",
        ApiCommand::History(history) => match history {
            HistoryCommand::Purge(_) => "history_purge",
            HistoryCommand::PurgeStatus(_) => "history_purge_status",
        },
        ApiCommand::Matrix(MatrixCommand::Raw(_)) => "matrix_raw",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_anywhere() -> Result<()> {
        let cli = Cli::try_parse_from([
            "hsadmin",
            "user",
            "list",
            "-o",
            "h",
            "-vv",
            "--batch",
            "--all",
            "--log-format",
            "json",
        ])?;
        assert_eq!(cli.output, Some(OutputFormat::Human));
        assert_eq!(cli.verbose, 2);
        assert!(cli.batch);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Api(ApiCommand::User(UserCommand::List(args))) => assert!(args.all),
            _ => return Err(anyhow!("expected user list")),
        }
        Ok(())
    }

    #[test]
    fn unknown_output_format_is_rejected() {
        assert!(Cli::try_parse_from(["hsadmin", "-o", "xml", "version"]).is_err());
    }

    #[test]
    fn prune_devices_defaults_keep_one_device() -> Result<()> {
        let cli = Cli::try_parse_from(["hsadmin", "user", "prune-devices", "alice"])?;
        match cli.command {
            Command::Api(ApiCommand::User(UserCommand::PruneDevices(args))) => {
                assert_eq!(args.min_surviving, 1);
                assert_eq!(args.min_days, None);
                assert!(!args.list_only);
            }
            _ => return Err(anyhow!("expected prune-devices")),
        }
        Ok(())
    }

    #[test]
    fn modify_rejects_contradictory_flags() {
        assert!(
            Cli::try_parse_from(["hsadmin", "user", "modify", "alice", "--admin", "--no-admin"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from([
                "hsadmin",
                "user",
                "modify",
                "alice",
                "--activate",
                "--deactivate"
            ])
            .is_err()
        );
    }

    #[test]
    fn quarantine_requires_a_target() {
        assert!(Cli::try_parse_from(["hsadmin", "media", "quarantine"]).is_err());
        assert!(
            Cli::try_parse_from(["hsadmin", "media", "quarantine", "--media-id", "abc"]).is_err()
        );
    }

    #[test]
    fn history_purge_requires_one_cutoff() -> Result<()> {
        assert!(Cli::try_parse_from(["hsadmin", "history", "purge", "!abc:example.org"]).is_err());
        assert!(
            Cli::try_parse_from([
                "hsadmin",
                "history",
                "purge",
                "!abc:example.org",
                "-d",
                "30",
                "--before",
                "2021-01-01"
            ])
            .is_err()
        );
        let cli = Cli::try_parse_from(["hsadmin", "history", "purge", "!abc:example.org", "-d", "30"])?;
        match cli.command {
            Command::Api(ApiCommand::History(HistoryCommand::Purge(args))) => {
                assert_eq!(args.before_days, Some(30));
                assert!(!args.delete_local);
            }
            _ => return Err(anyhow!("expected history purge")),
        }
        Ok(())
    }

    #[test]
    fn matrix_raw_shares_raw_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "hsadmin",
            "matrix",
            "raw",
            "client/versions",
            "-X",
            "post",
            "-d",
            "{}",
            "-p",
        ])?;
        match cli.command {
            Command::Api(ApiCommand::Matrix(MatrixCommand::Raw(args))) => {
                assert_eq!(args.request.endpoint, "client/versions");
                assert_eq!(args.request.method, "post");
                assert!(args.prompt);
            }
            _ => return Err(anyhow!("expected matrix raw")),
        }
        Ok(())
    }

    #[test]
    fn command_label_matches_variants() {
        assert_eq!(
            command_label(&Command::Api(ApiCommand::User(UserCommand::PruneDevices(
                PruneDevicesArgs::default()
            )))),
            "user_prune_devices"
        );
        assert_eq!(
            command_label(&Command::Api(ApiCommand::Notice(NoticeCommand::Send(
                NoticeSendArgs::default()
            )))),
            "notice_send"
        );
        assert_eq!(command_label(&Command::Api(ApiCommand::Version)), "version");
        assert_eq!(
            command_label(&Command::Api(ApiCommand::Matrix(MatrixCommand::Raw(
                MatrixRawArgs::default()
            )))),
            "matrix_raw"
        );
        assert_eq!(
            command_label(&Command::Config(ConfigArgs::default())),
            "config"
        );
    }
}

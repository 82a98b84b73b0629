//! Discord-facing side of the bot: REST client, polling connector,
//! slash-command registry management, and the inbound pipeline that
//! turns messages and invocations into stored commands, events, and
//! replies.

pub mod connector;
pub mod pipeline;
pub mod rest;
pub mod slash;
pub mod types;

pub use connector::{
    compare_snowflake_ids, is_newer_snowflake, load_gateway_state, save_gateway_state,
    GatewayConnector, GatewayConnectorConfig, GatewayCycleSummary, GatewayStateFile, GatewayStatus,
    GATEWAY_STATE_SCHEMA_VERSION, POLL_BATCH_LIMIT,
};
pub use pipeline::{MessagePipeline, LIST_REPLY_MAX_ENTRIES, LIST_REPLY_RESPONSE_PREVIEW_CHARS};
pub use rest::{format_user_tag, DiscordRestClient, DEFAULT_API_BASE};
pub use slash::{
    builtin_slash_commands, create_command, delete_command, is_valid_slash_name,
    sanitize_slash_name, sync_builtin_commands, SlashOptionSpec, SlashScope,
    SLASH_DESCRIPTION_MAX_CHARS, SLASH_NAME_MAX_CHARS,
};
pub use types::{
    BotProfile, ChannelInfo, ChannelSummary, CommandInvocation, GatewayError, GatewayErrorCode,
    GuildSummary, InboundMessage, InvocationOption, InvocationReply,
};

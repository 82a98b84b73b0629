use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `GatewayErrorCode` values.
pub enum GatewayErrorCode {
    MissingConfig,
    InvalidRequest,
    NotFound,
    AuthFailed,
    RateLimited,
    UpstreamUnavailable,
    TransportError,
    ParseFailed,
}

impl GatewayErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingConfig => "missing_config",
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::AuthFailed => "auth_failed",
            Self::RateLimited => "rate_limited",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::TransportError => "transport_error",
            Self::ParseFailed => "parse_failed",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
/// Classified failure from the Discord REST surface. Callers convert it
/// into an error event and a reply; it never aborts the process.
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidRequest, message, false)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.code, GatewayErrorCode::NotFound)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// The bot's own identity as reported by the platform.
pub struct BotProfile {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Text or announcement channel, with its category name when it has one.
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Channel lookup result used to attribute polled messages.
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// One inbound chat message, flattened and attributed. `guild_id` is
/// `None` for direct messages.
pub struct InboundMessage {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub guild_name: String,
    pub channel_name: String,
    pub author_id: String,
    pub author_tag: String,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
/// One slash-command invocation as delivered by the interactions
/// endpoint.
pub struct CommandInvocation {
    pub guild_id: Option<String>,
    pub guild_name: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_tag: String,
    pub command_name: String,
    pub options: Vec<InvocationOption>,
}

impl CommandInvocation {
    /// First value for the named string option.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.name == name)
            .map(|option| option.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the invoking user sees; `ephemeral` keeps it private to them.
pub struct InvocationReply {
    pub content: String,
    pub ephemeral: bool,
}

impl InvocationReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }
}

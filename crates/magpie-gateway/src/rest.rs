//! Discord REST client with linear-backoff retry.
//!
//! Auth failures (401/403) are terminal; 429 and 5xx responses retry up
//! to the configured attempt budget. Every failure is classified into a
//! [`GatewayErrorCode`] so callers can map it onto events and HTTP
//! statuses without inspecting reqwest internals.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::slash::SlashScope;
use crate::types::{
    BotProfile, ChannelInfo, ChannelSummary, GatewayError, GatewayErrorCode, GuildSummary,
    InboundMessage,
};

/// Default platform REST base; tests point this at a mock server.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const GUILD_TEXT_CHANNEL: u64 = 0;
const GUILD_ANNOUNCEMENT_CHANNEL: u64 = 5;

#[derive(Debug, Default, Deserialize)]
struct WireUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    discriminator: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: u64,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author: Option<WireUser>,
}

/// Renders the platform's display tag; post-migration accounts carry a
/// `0` discriminator and go by bare username.
pub fn format_user_tag(username: &str, discriminator: &str) -> String {
    let username = username.trim();
    let discriminator = discriminator.trim();
    if discriminator.is_empty() || discriminator == "0" {
        username.to_string()
    } else {
        format!("{username}#{discriminator}")
    }
}

/// Public struct `DiscordRestClient` used across Magpie components.
pub struct DiscordRestClient {
    client: Client,
    api_base: String,
    auth_header: String,
    application_id: Option<String>,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl DiscordRestClient {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        application_id: Option<&str>,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            auth_header: format!("Bot {}", bot_token.trim()),
            application_id: application_id
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            retry_max_attempts,
            retry_base_delay_ms,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub async fn current_user(&self) -> Result<BotProfile, GatewayError> {
        let url = format!("{}/users/@me", self.api_base);
        let payload = self
            .request_json_with_retry(|| self.client.get(url.as_str()))
            .await?;
        let user: WireUser = parse_payload(payload)?;
        Ok(BotProfile {
            id: user.id,
            tag: format_user_tag(&user.username, &user.discriminator),
        })
    }

    /// Guilds the bot belongs to, name-sorted.
    pub async fn list_guilds(&self) -> Result<Vec<GuildSummary>, GatewayError> {
        let url = format!("{}/users/@me/guilds", self.api_base);
        let payload = self
            .request_json_with_retry(|| self.client.get(url.as_str()))
            .await?;
        let guilds: Vec<WireGuild> = parse_payload(payload)?;
        let mut guilds: Vec<GuildSummary> = guilds
            .into_iter()
            .map(|guild| GuildSummary {
                id: guild.id,
                name: guild.name,
            })
            .collect();
        guilds.sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id)));
        Ok(guilds)
    }

    pub async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, GatewayError> {
        let url = format!("{}/channels/{}", self.api_base, channel_id.trim());
        let payload = self
            .request_json_with_retry(|| self.client.get(url.as_str()))
            .await?;
        let channel: WireChannel = parse_payload(payload)?;
        Ok(ChannelInfo {
            id: channel.id,
            name: channel.name,
            guild_id: channel.guild_id,
        })
    }

    /// Text and announcement channels of one guild, name-sorted, with
    /// category names resolved from the same listing.
    pub async fn list_text_channels(
        &self,
        guild_id: &str,
    ) -> Result<Vec<ChannelSummary>, GatewayError> {
        let url = format!("{}/guilds/{}/channels", self.api_base, guild_id.trim());
        let payload = self
            .request_json_with_retry(|| self.client.get(url.as_str()))
            .await?;
        let channels: Vec<WireChannel> = parse_payload(payload)?;
        let names_by_id: std::collections::BTreeMap<&str, &str> = channels
            .iter()
            .map(|channel| (channel.id.as_str(), channel.name.as_str()))
            .collect();
        let mut summaries: Vec<ChannelSummary> = channels
            .iter()
            .filter(|channel| {
                channel.kind == GUILD_TEXT_CHANNEL || channel.kind == GUILD_ANNOUNCEMENT_CHANNEL
            })
            .map(|channel| ChannelSummary {
                id: channel.id.clone(),
                name: channel.name.clone(),
                parent: channel
                    .parent_id
                    .as_deref()
                    .and_then(|parent_id| names_by_id.get(parent_id))
                    .map(|name| name.to_string()),
            })
            .collect();
        summaries
            .sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id)));
        Ok(summaries)
    }

    /// Posts `text` with mentions disabled.
    pub async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), GatewayError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id.trim());
        let body = json!({
            "content": text,
            "allowed_mentions": { "parse": [] },
        });
        self.request_json_with_retry(|| self.client.post(url.as_str()).json(&body))
            .await?;
        Ok(())
    }

    /// Newest page of a channel's messages, in the API's newest-first
    /// order; the connector re-sorts by snowflake before ingesting.
    pub async fn fetch_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, GatewayError> {
        let channel_id = channel_id.trim();
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let limit = limit.to_string();
        let payload = self
            .request_json_with_retry(|| {
                self.client
                    .get(url.as_str())
                    .query(&[("limit", limit.as_str())])
            })
            .await?;
        let messages: Vec<WireMessage> = parse_payload(payload)?;
        Ok(messages
            .into_iter()
            .map(|message| {
                let author = message.author.unwrap_or_default();
                InboundMessage {
                    id: message.id,
                    channel_id: if message.channel_id.trim().is_empty() {
                        channel_id.to_string()
                    } else {
                        message.channel_id
                    },
                    author_tag: format_user_tag(&author.username, &author.discriminator),
                    author_id: author.id,
                    author_is_bot: author.bot,
                    content: message.content,
                    ..InboundMessage::default()
                }
            })
            .collect())
    }

    /// Current application-command registry for the scope.
    pub async fn list_commands(&self, scope: &SlashScope) -> Result<Vec<Value>, GatewayError> {
        let url = self.commands_url(scope)?;
        let payload = self
            .request_json_with_retry(|| self.client.get(url.as_str()))
            .await?;
        payload.as_array().cloned().ok_or_else(|| {
            GatewayError::new(
                GatewayErrorCode::ParseFailed,
                "command registry response must be a JSON array",
                false,
            )
        })
    }

    /// Bulk-overwrites the scope's registry with `commands`.
    pub async fn put_commands(
        &self,
        scope: &SlashScope,
        commands: &[Value],
    ) -> Result<(), GatewayError> {
        let url = self.commands_url(scope)?;
        let body = Value::Array(commands.to_vec());
        self.request_json_with_retry(|| self.client.put(url.as_str()).json(&body))
            .await?;
        Ok(())
    }

    fn commands_url(&self, scope: &SlashScope) -> Result<String, GatewayError> {
        let application_id = self.application_id.as_deref().ok_or_else(|| {
            GatewayError::new(
                GatewayErrorCode::MissingConfig,
                "application id is not configured",
                false,
            )
        })?;
        Ok(match scope {
            SlashScope::Global => {
                format!("{}/applications/{}/commands", self.api_base, application_id)
            }
            SlashScope::Guild(guild_id) => format!(
                "{}/applications/{}/guilds/{}/commands",
                self.api_base,
                application_id,
                guild_id.trim()
            ),
        })
    }

    async fn request_json_with_retry<F>(&self, build_request: F) -> Result<Value, GatewayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.retry_max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = build_request()
                .header("authorization", self.auth_header.as_str())
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    if attempt < max_attempts {
                        self.sleep_retry_backoff(attempt).await;
                        continue;
                    }
                    return Err(GatewayError::new(
                        GatewayErrorCode::TransportError,
                        format!("discord transport error: {error}"),
                        true,
                    ));
                }
            };

            let status = response.status();
            if status.is_success() {
                let raw = response.text().await.map_err(|error| {
                    GatewayError::new(
                        GatewayErrorCode::TransportError,
                        format!("discord response read error: {error}"),
                        true,
                    )
                })?;
                if raw.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str::<Value>(&raw).map_err(|error| {
                    GatewayError::new(
                        GatewayErrorCode::ParseFailed,
                        format!("discord response parse error: {error}"),
                        false,
                    )
                });
            }

            let code = if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                GatewayErrorCode::AuthFailed
            } else if status == StatusCode::NOT_FOUND {
                GatewayErrorCode::NotFound
            } else if status == StatusCode::TOO_MANY_REQUESTS {
                GatewayErrorCode::RateLimited
            } else {
                GatewayErrorCode::UpstreamUnavailable
            };
            let retryable = (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                && attempt < max_attempts;
            if retryable {
                self.sleep_retry_backoff(attempt).await;
                continue;
            }
            return Err(GatewayError::new(
                code,
                format!("discord request failed with status {}", status.as_u16()),
                matches!(
                    code,
                    GatewayErrorCode::RateLimited | GatewayErrorCode::UpstreamUnavailable
                ),
            ));
        }
    }

    async fn sleep_retry_backoff(&self, attempt: usize) {
        if self.retry_base_delay_ms == 0 {
            return;
        }
        let delay_ms = self
            .retry_base_delay_ms
            .saturating_mul(u64::try_from(attempt).unwrap_or(1));
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, GatewayError> {
    serde_json::from_value(payload).map_err(|error| {
        GatewayError::new(
            GatewayErrorCode::ParseFailed,
            format!("unexpected discord payload shape: {error}"),
            false,
        )
    })
}

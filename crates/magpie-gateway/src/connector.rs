//! Polling gateway connector.
//!
//! Configured channels are polled each cycle; per-channel snowflake
//! watermarks persist in `gateway-state.json` so a restart never
//! re-ingests old messages. Transport failures degrade the cycle
//! instead of aborting it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use magpie_core::{current_unix_timestamp_ms, write_text_atomic};

use crate::pipeline::MessagePipeline;
use crate::rest::DiscordRestClient;
use crate::types::InboundMessage;

pub const GATEWAY_STATE_SCHEMA_VERSION: u32 = 1;

/// Messages fetched per channel per cycle.
pub const POLL_BATCH_LIMIT: usize = 50;

fn default_gateway_state_schema_version() -> u32 {
    GATEWAY_STATE_SCHEMA_VERSION
}

/// Public struct `GatewayStateFile` used across Magpie components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStateFile {
    #[serde(default = "default_gateway_state_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub last_message_ids: BTreeMap<String, String>,
}

impl Default for GatewayStateFile {
    fn default() -> Self {
        Self {
            schema_version: GATEWAY_STATE_SCHEMA_VERSION,
            last_message_ids: BTreeMap::new(),
        }
    }
}

pub fn load_gateway_state(path: &Path) -> Result<GatewayStateFile> {
    if !path.exists() {
        return Ok(GatewayStateFile::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save_gateway_state(path: &Path, state: &GatewayStateFile) -> Result<()> {
    let mut serialized =
        serde_json::to_string_pretty(state).context("failed to serialize gateway state")?;
    serialized.push('\n');
    write_text_atomic(path, &serialized)
}

/// Live connector snapshot the dashboard status endpoint reads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GatewayStatus {
    pub online: bool,
    pub user_tag: String,
    pub guild_count: usize,
    pub last_cycle_unix_ms: u64,
    pub messages_ingested: u64,
    pub bot_messages_skipped: u64,
    pub replies_sent: u64,
    pub transport_failures: u64,
}

/// Per-cycle counters, also folded into the shared [`GatewayStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayCycleSummary {
    pub messages_ingested: u64,
    pub bot_messages_skipped: u64,
    pub replies_sent: u64,
    pub transport_failures: u64,
}

/// Public struct `GatewayConnectorConfig` used across Magpie components.
#[derive(Debug, Clone)]
pub struct GatewayConnectorConfig {
    pub state_path: PathBuf,
    pub poll_channel_ids: Vec<String>,
}

struct ChannelMeta {
    guild_id: Option<String>,
    channel_name: String,
    guild_name: String,
}

/// Public struct `GatewayConnector` used across Magpie components.
pub struct GatewayConnector {
    config: GatewayConnectorConfig,
    rest: Arc<DiscordRestClient>,
    pipeline: Arc<MessagePipeline>,
    status: Arc<Mutex<GatewayStatus>>,
    state: GatewayStateFile,
    channel_meta: BTreeMap<String, ChannelMeta>,
    guild_names: BTreeMap<String, String>,
    online: bool,
    user_tag: String,
}

impl GatewayConnector {
    pub fn new(
        config: GatewayConnectorConfig,
        rest: Arc<DiscordRestClient>,
        pipeline: Arc<MessagePipeline>,
        status: Arc<Mutex<GatewayStatus>>,
    ) -> Result<Self> {
        let state = load_gateway_state(&config.state_path)?;
        Ok(Self {
            config,
            rest,
            pipeline,
            status,
            state,
            channel_meta: BTreeMap::new(),
            guild_names: BTreeMap::new(),
            online: false,
            user_tag: String::new(),
        })
    }

    /// Runs one full poll cycle: refresh identity and guild directory,
    /// drain every configured channel past its watermark, persist the
    /// advanced watermarks, publish the status snapshot.
    pub async fn run_poll_cycle(&mut self) -> GatewayCycleSummary {
        let mut summary = GatewayCycleSummary::default();
        self.refresh_directory(&mut summary).await;

        let channel_ids = self.config.poll_channel_ids.clone();
        for channel_id in &channel_ids {
            self.poll_channel(channel_id, &mut summary).await;
        }

        if let Err(error) = save_gateway_state(&self.config.state_path, &self.state) {
            tracing::warn!("failed to persist gateway state: {error:#}");
        }
        self.publish_status(&summary).await;
        summary
    }

    async fn refresh_directory(&mut self, summary: &mut GatewayCycleSummary) {
        if self.user_tag.is_empty() || !self.online {
            match self.rest.current_user().await {
                Ok(profile) => self.user_tag = profile.tag,
                Err(error) => {
                    summary.transport_failures = summary.transport_failures.saturating_add(1);
                    tracing::warn!("failed to fetch bot profile: {error}");
                }
            }
        }
        match self.rest.list_guilds().await {
            Ok(guilds) => {
                self.guild_names = guilds
                    .into_iter()
                    .map(|guild| (guild.id, guild.name))
                    .collect();
                self.online = true;
            }
            Err(error) => {
                summary.transport_failures = summary.transport_failures.saturating_add(1);
                self.online = false;
                tracing::warn!("failed to list guilds: {error}");
            }
        }
    }

    async fn poll_channel(&mut self, channel_id: &str, summary: &mut GatewayCycleSummary) {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return;
        }
        if !self.ensure_channel_meta(channel_id, summary).await {
            return;
        }

        let mut batch = match self.rest.fetch_messages(channel_id, POLL_BATCH_LIMIT).await {
            Ok(batch) => batch,
            Err(error) => {
                summary.transport_failures = summary.transport_failures.saturating_add(1);
                tracing::warn!(channel_id, "failed to fetch messages: {error}");
                return;
            }
        };
        batch.sort_by(|left, right| compare_snowflake_ids(&left.id, &right.id));

        let previous = self
            .state
            .last_message_ids
            .get(channel_id)
            .cloned()
            .unwrap_or_default();
        let mut latest_seen = previous.clone();
        for message in batch {
            if !is_newer_snowflake(&message.id, &previous) {
                continue;
            }
            // Bot-authored messages still advance the watermark.
            if is_newer_snowflake(&message.id, &latest_seen) {
                latest_seen = message.id.clone();
            }
            if message.author_is_bot {
                summary.bot_messages_skipped = summary.bot_messages_skipped.saturating_add(1);
                continue;
            }
            let enriched = self.attach_channel_meta(channel_id, message);
            summary.messages_ingested = summary.messages_ingested.saturating_add(1);
            if self.pipeline.handle_message(&enriched).await {
                summary.replies_sent = summary.replies_sent.saturating_add(1);
            }
        }
        if !latest_seen.is_empty() {
            self.state
                .last_message_ids
                .insert(channel_id.to_string(), latest_seen);
        }
    }

    /// Resolves and caches the channel's guild and display names. On a
    /// lookup failure the channel is skipped this cycle and retried on
    /// the next one.
    async fn ensure_channel_meta(
        &mut self,
        channel_id: &str,
        summary: &mut GatewayCycleSummary,
    ) -> bool {
        if let Some(meta) = self.channel_meta.get_mut(channel_id) {
            if meta.guild_name.is_empty() {
                if let Some(name) = meta
                    .guild_id
                    .as_deref()
                    .and_then(|guild_id| self.guild_names.get(guild_id))
                {
                    meta.guild_name = name.clone();
                }
            }
            return true;
        }
        match self.rest.channel_info(channel_id).await {
            Ok(info) => {
                let guild_name = info
                    .guild_id
                    .as_deref()
                    .and_then(|guild_id| self.guild_names.get(guild_id))
                    .cloned()
                    .unwrap_or_default();
                self.channel_meta.insert(
                    channel_id.to_string(),
                    ChannelMeta {
                        guild_id: info.guild_id,
                        channel_name: info.name,
                        guild_name,
                    },
                );
                true
            }
            Err(error) => {
                summary.transport_failures = summary.transport_failures.saturating_add(1);
                tracing::warn!(channel_id, "failed to resolve channel: {error}");
                false
            }
        }
    }

    fn attach_channel_meta(&self, channel_id: &str, mut message: InboundMessage) -> InboundMessage {
        if let Some(meta) = self.channel_meta.get(channel_id) {
            message.guild_id = meta.guild_id.clone();
            message.guild_name = meta.guild_name.clone();
            message.channel_name = meta.channel_name.clone();
        }
        message
    }

    async fn publish_status(&self, summary: &GatewayCycleSummary) {
        let mut status = self.status.lock().await;
        status.online = self.online;
        status.user_tag = self.user_tag.clone();
        status.guild_count = self.guild_names.len();
        status.last_cycle_unix_ms = current_unix_timestamp_ms();
        status.messages_ingested = status
            .messages_ingested
            .saturating_add(summary.messages_ingested);
        status.bot_messages_skipped = status
            .bot_messages_skipped
            .saturating_add(summary.bot_messages_skipped);
        status.replies_sent = status.replies_sent.saturating_add(summary.replies_sent);
        status.transport_failures = status
            .transport_failures
            .saturating_add(summary.transport_failures);
    }
}

/// Snowflake ids are numeric and time-ordered; fall back to a string
/// compare when one does not parse.
pub fn compare_snowflake_ids(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.parse::<u128>(), right.parse::<u128>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        _ => left.cmp(right),
    }
}

pub fn is_newer_snowflake(candidate: &str, previous: &str) -> bool {
    if previous.is_empty() {
        return !candidate.is_empty();
    }
    compare_snowflake_ids(candidate, previous).is_gt()
}

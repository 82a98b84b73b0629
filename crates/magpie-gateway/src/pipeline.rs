//! Inbound activity pipeline.
//!
//! Every message and slash invocation is recorded before any reply is
//! attempted, so the event log reflects what arrived even when sending
//! fails. Send failures become `error`-kind events and never abort the
//! polling loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use magpie_commands::{normalize_message_text, normalize_trigger_name, CommandError, CommandStore, DM_GUILD_ID};
use magpie_events::{Event, EventKind, EventRecorder};

use crate::rest::DiscordRestClient;
use crate::types::{CommandInvocation, InboundMessage, InvocationReply};

/// `list` replies cap out rather than flooding the channel.
pub const LIST_REPLY_MAX_ENTRIES: usize = 50;
pub const LIST_REPLY_RESPONSE_PREVIEW_CHARS: usize = 60;

const PING_REPLY: &str = "pong 🏓";

/// Public struct `MessagePipeline` used across Magpie components.
pub struct MessagePipeline {
    store: Arc<Mutex<CommandStore>>,
    recorder: Arc<Mutex<EventRecorder>>,
    rest: Arc<DiscordRestClient>,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<Mutex<CommandStore>>,
        recorder: Arc<Mutex<EventRecorder>>,
        rest: Arc<DiscordRestClient>,
    ) -> Self {
        Self {
            store,
            recorder,
            rest,
        }
    }

    /// Handles one inbound channel message; returns true when a reply
    /// was sent.
    pub async fn handle_message(&self, message: &InboundMessage) -> bool {
        self.record(message_event(message)).await;

        let guild_key = message.guild_id.as_deref().unwrap_or(DM_GUILD_ID);
        let resolved = {
            let store = self.store.lock().await;
            store
                .resolve(guild_key, &message.content)
                .map(|hit| (hit.name.to_string(), hit.response.to_string()))
        };
        if let Some((name, response)) = resolved {
            let mut event = message_event(message);
            event.kind = EventKind::Custom;
            event.command_name = Some(name);
            event.content = Some(response.clone());
            self.record(event).await;
            return self
                .send_or_record_error(&message.channel_id, &response)
                .await;
        }

        if normalize_message_text(&message.content) == "ping" {
            return self
                .send_or_record_error(&message.channel_id, PING_REPLY)
                .await;
        }
        false
    }

    /// Handles one slash invocation and renders the reply the caller
    /// should present to the invoking user.
    pub async fn handle_invocation(&self, invocation: &CommandInvocation) -> InvocationReply {
        self.record(slash_event(invocation)).await;

        let guild_id = invocation.guild_id.clone().unwrap_or_default();
        match invocation.command_name.as_str() {
            "add" => {
                let name = invocation.option("name").unwrap_or_default().trim().to_string();
                let response = invocation.option("message").unwrap_or_default().to_string();
                let outcome = {
                    let mut store = self.store.lock().await;
                    store.add(&guild_id, &name, &response)
                };
                match outcome {
                    Ok(()) => InvocationReply::ephemeral(format!(
                        "Added custom command `!{}`",
                        normalize_trigger_name(&name)
                    )),
                    Err(error) => self.store_failure_reply(error).await,
                }
            }
            "list" => {
                let entries = {
                    let store = self.store.lock().await;
                    store.list(&guild_id)
                };
                if entries.is_empty() {
                    return InvocationReply::ephemeral("No custom commands here yet.");
                }
                let mut lines = vec![format!("{} custom command(s)", entries.len())];
                for (name, response) in entries.iter().take(LIST_REPLY_MAX_ENTRIES) {
                    lines.push(format!(
                        "`!{name}` -> {}",
                        preview_response(response)
                    ));
                }
                InvocationReply::ephemeral(lines.join("\n"))
            }
            "remove" => {
                let name = invocation.option("name").unwrap_or_default().trim().to_string();
                let outcome = {
                    let mut store = self.store.lock().await;
                    store.remove(&guild_id, &name)
                };
                match outcome {
                    Ok(()) => InvocationReply::ephemeral(format!(
                        "Removed custom command `!{}`",
                        normalize_trigger_name(&name)
                    )),
                    Err(CommandError::NotFound { name, .. }) => {
                        InvocationReply::ephemeral(format!("`!{name}` does not exist."))
                    }
                    Err(error) => self.store_failure_reply(error).await,
                }
            }
            "ping" => InvocationReply::ephemeral(PING_REPLY),
            "say" => {
                let text = invocation.option("message").unwrap_or_default().to_string();
                if text.trim().is_empty() {
                    return InvocationReply::ephemeral("Nothing to send.");
                }
                match self.rest.send_message(&invocation.channel_id, &text).await {
                    Ok(()) => InvocationReply::ephemeral("Sent."),
                    Err(error) => {
                        self.record(Event::error(format!("failed to send reply: {error}")))
                            .await;
                        InvocationReply::ephemeral("Failed to send the message.")
                    }
                }
            }
            other => {
                let joined: Vec<&str> = invocation
                    .options
                    .iter()
                    .map(|option| option.value.as_str())
                    .collect();
                let text = if joined.is_empty() {
                    "(no text)".to_string()
                } else {
                    joined.join(" ")
                };
                InvocationReply::ephemeral(format!("/{other} received: {text}"))
            }
        }
    }

    async fn send_or_record_error(&self, channel_id: &str, text: &str) -> bool {
        match self.rest.send_message(channel_id, text).await {
            Ok(()) => true,
            Err(error) => {
                self.record(Event::error(format!("failed to send reply: {error}")))
                    .await;
                false
            }
        }
    }

    async fn store_failure_reply(&self, error: CommandError) -> InvocationReply {
        if matches!(error, CommandError::Persistence(_)) {
            self.record(Event::error(format!("command store write failed: {error}")))
                .await;
            return InvocationReply::ephemeral("Something went wrong while saving, try again.");
        }
        InvocationReply::ephemeral(error.to_string())
    }

    async fn record(&self, event: Event) {
        let mut recorder = self.recorder.lock().await;
        recorder.record(event);
    }
}

fn preview_response(response: &str) -> String {
    let preview: String = response
        .chars()
        .take(LIST_REPLY_RESPONSE_PREVIEW_CHARS)
        .collect();
    if response.chars().count() > LIST_REPLY_RESPONSE_PREVIEW_CHARS {
        format!("{preview}…")
    } else {
        preview
    }
}

fn message_event(message: &InboundMessage) -> Event {
    let mut event = Event::now(EventKind::Message);
    event.guild_id = message.guild_id.clone().unwrap_or_default();
    event.guild_name = message.guild_name.clone();
    event.channel_name = message.channel_name.clone();
    event.user_id = message.author_id.clone();
    event.user_tag = message.author_tag.clone();
    event.content = Some(message.content.clone());
    event
}

fn slash_event(invocation: &CommandInvocation) -> Event {
    let mut event = Event::now(EventKind::Slash);
    event.guild_id = invocation.guild_id.clone().unwrap_or_default();
    event.guild_name = invocation.guild_name.clone();
    event.user_id = invocation.user_id.clone();
    event.user_tag = invocation.user_tag.clone();
    event.command_name = Some(invocation.command_name.clone());
    if !invocation.options.is_empty() {
        let map: serde_json::Map<String, Value> = invocation
            .options
            .iter()
            .map(|option| (option.name.clone(), Value::String(option.value.clone())))
            .collect();
        event.options = Some(Value::Object(map));
    }
    event
}

//! Slash-command registry management.
//!
//! Registry writes go through the platform's bulk-overwrite endpoint:
//! read the current set, merge or filter locally, PUT the result back.

use serde_json::{json, Value};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::rest::DiscordRestClient;
use crate::types::{GatewayError, GatewayErrorCode};

pub const SLASH_NAME_MAX_CHARS: usize = 32;
pub const SLASH_DESCRIPTION_MAX_CHARS: usize = 100;

/// Permission bitfield granting Manage Guild, serialized as a string
/// the way the platform expects.
const MANAGE_GUILD_PERMISSION: &str = "32";
const STRING_OPTION_TYPE: u64 = 3;

/// Enumerates supported `SlashScope` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashScope {
    Global,
    Guild(String),
}

/// Coerces arbitrary text into a registry-legal command name; accented
/// letters fold to their base form rather than vanishing. Returns an
/// empty string when nothing survives; callers reject that case.
pub fn sanitize_slash_name(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect();
    let mut collapsed = String::with_capacity(folded.len());
    let mut in_whitespace = false;
    for ch in folded.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                collapsed.push('-');
                in_whitespace = true;
            }
        } else {
            collapsed.push(ch);
            in_whitespace = false;
        }
    }
    collapsed
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_' || *ch == '-')
        .take(SLASH_NAME_MAX_CHARS)
        .collect()
}

pub fn is_valid_slash_name(name: &str) -> bool {
    (1..=SLASH_NAME_MAX_CHARS).contains(&name.chars().count())
        && name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
}

fn clamp_description(raw: &str, fallback: &str) -> String {
    let clamped: String = raw.chars().take(SLASH_DESCRIPTION_MAX_CHARS).collect();
    if clamped.trim().is_empty() {
        fallback.to_string()
    } else {
        clamped
    }
}

fn string_option(name: &str, description: &str, required: bool) -> Value {
    json!({
        "type": STRING_OPTION_TYPE,
        "name": name,
        "description": clamp_description(description, "option"),
        "required": required,
    })
}

/// Built-in command definitions the bot registers on startup. The
/// mutating commands require Manage Guild; `list` stays open to
/// everyone and none of them work in DMs.
pub fn builtin_slash_commands() -> Vec<Value> {
    vec![
        json!({
            "name": "add",
            "description": "Add a custom !command for this guild",
            "default_member_permissions": MANAGE_GUILD_PERMISSION,
            "dm_permission": false,
            "options": [
                string_option("name", "Trigger name (without the !)", true),
                string_option("message", "Reply the bot sends", true),
            ],
        }),
        json!({
            "name": "list",
            "description": "List this guild's custom commands",
            "default_member_permissions": Value::Null,
            "dm_permission": false,
        }),
        json!({
            "name": "remove",
            "description": "Remove a custom !command from this guild",
            "default_member_permissions": MANAGE_GUILD_PERMISSION,
            "dm_permission": false,
            "options": [string_option("name", "Trigger name to remove", true)],
        }),
        json!({
            "name": "ping",
            "description": "Check that the bot is alive",
            "dm_permission": false,
        }),
        json!({
            "name": "say",
            "description": "Make the bot post a message in this channel",
            "default_member_permissions": MANAGE_GUILD_PERMISSION,
            "dm_permission": false,
            "options": [string_option("message", "Text to post", true)],
        }),
    ]
}

/// Overwrites the guild's registry with the builtin set; returns how
/// many definitions were pushed.
pub async fn sync_builtin_commands(
    rest: &DiscordRestClient,
    guild_id: &str,
) -> Result<usize, GatewayError> {
    let commands = builtin_slash_commands();
    rest.put_commands(&SlashScope::Guild(guild_id.to_string()), &commands)
        .await?;
    Ok(commands.len())
}

/// Public struct `SlashOptionSpec` used across Magpie components.
#[derive(Debug, Clone)]
pub struct SlashOptionSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Registers (or replaces) one slash command in `scope`. Any existing
/// definition with the same name is dropped before the merged set is
/// written back. Returns the sanitized name actually registered.
pub async fn create_command(
    rest: &DiscordRestClient,
    scope: &SlashScope,
    name: &str,
    description: &str,
    options: &[SlashOptionSpec],
) -> Result<String, GatewayError> {
    let sanitized = sanitize_slash_name(name);
    if !is_valid_slash_name(&sanitized) {
        return Err(GatewayError::invalid_request(format!(
            "slash command name '{name}' reduces to nothing registrable"
        )));
    }
    let mut clean_options = Vec::with_capacity(options.len());
    for option in options {
        let option_name = sanitize_slash_name(&option.name);
        if !is_valid_slash_name(&option_name) {
            return Err(GatewayError::invalid_request(format!(
                "slash option name '{}' reduces to nothing registrable",
                option.name
            )));
        }
        clean_options.push(string_option(
            &option_name,
            &option.description,
            option.required,
        ));
    }

    let mut registry = rest.list_commands(scope).await?;
    registry.retain(|entry| {
        entry
            .get("name")
            .and_then(Value::as_str)
            .map(|existing| existing != sanitized)
            .unwrap_or(true)
    });
    registry.push(json!({
        "name": sanitized,
        "description": clamp_description(description, "cmd"),
        "dm_permission": false,
        "options": clean_options,
    }));
    rest.put_commands(scope, &registry).await?;
    Ok(sanitized)
}

/// Removes the command with `command_id` from the scope's registry.
/// Deleting an id that is not present is a no-op, not an error; the
/// remaining set is written back either way.
pub async fn delete_command(
    rest: &DiscordRestClient,
    scope: &SlashScope,
    command_id: &str,
) -> Result<(), GatewayError> {
    let command_id = command_id.trim();
    if command_id.is_empty() {
        return Err(GatewayError::new(
            GatewayErrorCode::InvalidRequest,
            "command id is required",
            false,
        ));
    }
    let mut registry = rest.list_commands(scope).await?;
    registry.retain(|entry| {
        entry
            .get("id")
            .and_then(Value::as_str)
            .map(|existing| existing != command_id)
            .unwrap_or(true)
    });
    rest.put_commands(scope, &registry).await?;
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `EventKind` values.
pub enum EventKind {
    Message,
    Slash,
    Custom,
    Error,
    Info,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Slash => "slash",
            EventKind::Custom => "custom",
            EventKind::Error => "error",
            EventKind::Info => "info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "message" => Some(EventKind::Message),
            "slash" => Some(EventKind::Slash),
            "custom" => Some(EventKind::Custom),
            "error" => Some(EventKind::Error),
            "info" => Some(EventKind::Info),
            _ => None,
        }
    }
}

/// One structured activity record; immutable once created.
///
/// Wire names are camelCase because the JSONL day files and the SSE
/// stream carry the dashboard's established payload format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub guild_name: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl Event {
    /// Builds an event stamped with the current time and empty identity.
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            guild_id: String::new(),
            guild_name: String::new(),
            channel_name: String::new(),
            user_id: String::new(),
            user_tag: String::new(),
            command_name: None,
            content: None,
            options: None,
        }
    }

    /// System notice carrying no guild or user identity.
    pub fn info(content: impl Into<String>) -> Self {
        let mut event = Self::now(EventKind::Info);
        event.content = Some(content.into());
        event
    }

    /// Error notice carrying no guild or user identity.
    pub fn error(content: impl Into<String>) -> Self {
        let mut event = Self::now(EventKind::Error);
        event.content = Some(content.into());
        event
    }

    /// UTC calendar day this event belongs to, as `YYYY-MM-DD`.
    pub fn day_stamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, EventKind};
    use chrono::TimeZone;

    #[test]
    fn unit_event_serializes_with_wire_field_names() {
        let mut event = Event::now(EventKind::Custom);
        event.timestamp = chrono::Utc
            .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
            .single()
            .expect("timestamp");
        event.guild_id = "guild-1".to_string();
        event.user_tag = "user#1234".to_string();
        event.command_name = Some("greet".to_string());

        let line = serde_json::to_string(&event).expect("encode");
        assert!(line.contains("\"type\":\"custom\""));
        assert!(line.contains("\"guildId\":\"guild-1\""));
        assert!(line.contains("\"userTag\":\"user#1234\""));
        assert!(line.contains("\"commandName\":\"greet\""));
        assert!(!line.contains("\"content\""));
        assert!(!line.contains("\"options\""));
    }

    #[test]
    fn unit_event_round_trips_through_serde() {
        let mut event = Event::info("bot started");
        event.guild_id = "dm".to_string();

        let line = serde_json::to_string(&event).expect("encode");
        let parsed: Event = serde_json::from_str(&line).expect("decode");
        assert_eq!(parsed, event);
    }

    #[test]
    fn unit_day_stamp_uses_utc_calendar_day() {
        let mut event = Event::now(EventKind::Info);
        event.timestamp = chrono::Utc
            .with_ymd_and_hms(2026, 1, 31, 23, 59, 59)
            .single()
            .expect("timestamp");
        assert_eq!(event.day_stamp(), "2026-01-31");
    }

    #[test]
    fn unit_event_kind_parse_accepts_wire_values() {
        assert_eq!(EventKind::parse("message"), Some(EventKind::Message));
        assert_eq!(EventKind::parse(" SLASH "), Some(EventKind::Slash));
        assert_eq!(EventKind::parse("bogus"), None);
    }
}

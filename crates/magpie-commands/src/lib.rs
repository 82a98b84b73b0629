//! Guild-scoped custom commands: persistent trigger store and resolution.
//!
//! A trigger maps a short name to a canned response inside one guild
//! (`"dm"` scopes direct messages). The store is a single JSON file
//! rewritten atomically on every mutation; resolution tries an exact
//! `!name` prefix hit first and falls back to longest-substring
//! containment.

pub mod error;
pub mod resolver;
pub mod store;

pub use error::CommandError;
pub use resolver::{normalize_message_text, resolve_in_map, ResolvedCommand, TRIGGER_MARKER};
pub use store::{
    is_valid_trigger_name, normalize_trigger_name, CommandStore, DM_GUILD_ID,
    MAX_TRIGGER_NAME_CHARS,
};

use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `CommandError` values.
pub enum CommandError {
    #[error("invalid command name '{0}': 1-32 characters, no whitespace")]
    InvalidName(String),
    #[error("guild id is required")]
    MissingGuildId,
    #[error("no custom command named '{name}' in guild '{guild_id}'")]
    NotFound { guild_id: String, name: String },
    #[error("failed to persist command store: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl CommandError {
    /// True for the validation failures that leave the store untouched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CommandError::InvalidName(_) | CommandError::MissingGuildId
        )
    }
}

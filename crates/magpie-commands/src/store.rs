//! Persistent guild → trigger → response storage.
//!
//! One JSON file holds every guild's mapping. The file is loaded once at
//! startup and rewritten in full, atomically, after every mutation; a
//! crash mid-write leaves the previous complete version in place.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use magpie_core::write_text_atomic;

use crate::error::CommandError;
use crate::resolver::{resolve_in_map, ResolvedCommand};

/// Guild id that scopes direct-message commands.
pub const DM_GUILD_ID: &str = "dm";

/// Longest accepted trigger name, counted in characters.
pub const MAX_TRIGGER_NAME_CHARS: usize = 32;

/// True when `name` is 1-32 characters with no whitespace anywhere.
pub fn is_valid_trigger_name(name: &str) -> bool {
    (1..=MAX_TRIGGER_NAME_CHARS).contains(&name.chars().count())
        && !name.chars().any(char::is_whitespace)
}

/// Trims and case-folds a trigger name to its stored form.
pub fn normalize_trigger_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug)]
/// Public struct `CommandStore` used across Magpie components.
pub struct CommandStore {
    path: PathBuf,
    guilds: BTreeMap<String, BTreeMap<String, String>>,
}

impl CommandStore {
    /// Loads the store from `path`; an absent file yields an empty mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let guilds = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            guilds,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds (or silently overwrites) a trigger and persists the store.
    pub fn add(&mut self, guild_id: &str, name: &str, response: &str) -> Result<(), CommandError> {
        let guild_id = guild_id.trim();
        if guild_id.is_empty() {
            return Err(CommandError::MissingGuildId);
        }
        let trimmed = name.trim();
        if !is_valid_trigger_name(trimmed) {
            return Err(CommandError::InvalidName(trimmed.to_string()));
        }
        let normalized = normalize_trigger_name(trimmed);
        self.guilds
            .entry(guild_id.to_string())
            .or_default()
            .insert(normalized, response.to_string());
        self.save()
    }

    /// Removes a trigger and persists the store; `NotFound` leaves the
    /// mapping unchanged.
    pub fn remove(&mut self, guild_id: &str, name: &str) -> Result<(), CommandError> {
        let guild_id = guild_id.trim();
        if guild_id.is_empty() {
            return Err(CommandError::MissingGuildId);
        }
        let normalized = normalize_trigger_name(name);
        let removed = match self.guilds.get_mut(guild_id) {
            Some(triggers) => triggers.remove(&normalized).is_some(),
            None => false,
        };
        if !removed {
            return Err(CommandError::NotFound {
                guild_id: guild_id.to_string(),
                name: normalized,
            });
        }
        if self
            .guilds
            .get(guild_id)
            .is_some_and(|triggers| triggers.is_empty())
        {
            self.guilds.remove(guild_id);
        }
        self.save()
    }

    /// Snapshot of one guild's triggers in name order.
    pub fn list(&self, guild_id: &str) -> Vec<(String, String)> {
        self.guilds
            .get(guild_id.trim())
            .map(|triggers| {
                triggers
                    .iter()
                    .map(|(name, response)| (name.clone(), response.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolves message text against one guild's triggers.
    pub fn resolve(&self, guild_id: &str, text: &str) -> Option<ResolvedCommand<'_>> {
        let triggers = self.guilds.get(guild_id)?;
        resolve_in_map(triggers, text)
    }

    /// Total number of triggers across every guild.
    pub fn trigger_count(&self) -> usize {
        self.guilds.values().map(BTreeMap::len).sum()
    }

    fn save(&self) -> Result<(), CommandError> {
        let mut payload = match serde_json::to_string_pretty(&self.guilds) {
            Ok(payload) => payload,
            Err(error) => return Err(CommandError::Persistence(error.into())),
        };
        payload.push('\n');
        write_text_atomic(&self.path, &payload).map_err(CommandError::Persistence)
    }
}

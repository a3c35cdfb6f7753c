//! Per-participant metadata lookup.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use super::Participant;

/// Metadata key holding a participant's nickname.
pub const NICKNAME: &str = "nickname";
/// Metadata key holding a participant's pronouns.
pub const PRONOUNS: &str = "pronouns";
/// Metadata key holding a participant's IANA timezone name.
pub const TIMEZONE: &str = "timezone";

/// Key-value metadata attached to participants.
pub trait MetadataStore: Send + Sync {
    /// Get a metadata value.
    fn get(&self, participant: Uuid, key: &str) -> Option<String>;
}

/// In-memory metadata store.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    values: RwLock<HashMap<Uuid, HashMap<String, String>>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&self, participant: Uuid, key: impl Into<String>, value: impl Into<String>) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values
            .entry(participant)
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Remove a value.
    ///
    /// Returns the previous value, if any.
    pub fn remove(&self, participant: Uuid, key: &str) -> Option<String> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.get_mut(&participant)?.remove(key)
    }

    /// Drop every value stored for a participant.
    pub fn clear(&self, participant: Uuid) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.remove(&participant);
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, participant: Uuid, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(&participant)?.get(key).cloned()
    }
}

/// Name shown for a participant: the nickname if set, else the username.
///
/// Legacy `§` markers are removed from nicknames.
pub fn display_name(participant: &dyn Participant, metadata: &dyn MetadataStore) -> String {
    match metadata.get(participant.id(), NICKNAME) {
        Some(nick) if !nick.trim().is_empty() => nick.replace('§', ""),
        _ => participant.username().to_string(),
    }
}

/// Check if `name` refers to a participant by display name or username.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
pub fn matches_name(
    participant: &dyn Participant,
    name: &str,
    metadata: &dyn MetadataStore,
) -> bool {
    let wanted = name.trim().to_lowercase();
    display_name(participant, metadata).trim().to_lowercase() == wanted
        || participant.username().trim().to_lowercase() == wanted
}

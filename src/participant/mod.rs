//! Participant module for gChat.
//!
//! This module provides the participant-facing collaborators:
//! - Identity and permission lookup ([`Participant`])
//! - Per-participant metadata ([`MetadataStore`])
//! - Connected sessions and message delivery ([`SessionRegistry`], [`DeliverySink`])

mod metadata;
mod session;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

pub use metadata::{
    display_name, matches_name, MemoryMetadataStore, MetadataStore, NICKNAME, PRONOUNS, TIMEZONE,
};
pub use session::{DeliverySink, SessionRegistry};

/// Shared handle to a participant.
pub type ParticipantRef = Arc<dyn Participant>;

/// Wildcard permission granting every node.
pub const WILDCARD_PERMISSION: &str = "*";

/// An end user connected through the relay.
pub trait Participant: Send + Sync + fmt::Debug {
    /// Stable unique id.
    fn id(&self) -> Uuid;

    /// Login name.
    fn username(&self) -> &str;

    /// Check a permission node.
    fn has_permission(&self, permission: &str) -> bool;

    /// Name of the backend server the participant is on, if any.
    fn current_server(&self) -> Option<String> {
        None
    }

    /// Round-trip latency in milliseconds, if known.
    fn ping(&self) -> Option<u64> {
        None
    }
}

/// A participant with a fixed permission set.
#[derive(Debug, Clone)]
pub struct BasicParticipant {
    id: Uuid,
    username: String,
    permissions: HashSet<String>,
    server: Option<String>,
    ping: Option<u64>,
}

impl BasicParticipant {
    /// Create a participant with a random id and no permissions.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            permissions: HashSet::new(),
            server: None,
            ping: None,
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Grant a permission node.
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Set the current server.
    pub fn on_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Set the ping.
    pub fn with_ping(mut self, ping: u64) -> Self {
        self.ping = Some(ping);
        self
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ParticipantRef {
        Arc::new(self)
    }
}

impl Participant for BasicParticipant {
    fn id(&self) -> Uuid {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(WILDCARD_PERMISSION) || self.permissions.contains(permission)
    }

    fn current_server(&self) -> Option<String> {
        self.server.clone()
    }

    fn ping(&self) -> Option<u64> {
        self.ping
    }
}

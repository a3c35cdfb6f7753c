//! Connected-session registry for gChat.
//!
//! Sessions are created when a participant connects and destroyed when they
//! disconnect. Each session owns an outbox channel that rendered messages are
//! pushed into.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{matches_name, MetadataStore, Participant, ParticipantRef};
use crate::text::StructuredText;

/// Delivers rendered messages to participants.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Snapshot of every currently connected participant.
    async fn participants(&self) -> Vec<ParticipantRef>;

    /// Deliver a message to one participant.
    ///
    /// Returns true if the message was handed to the participant's connection.
    async fn send(&self, recipient: &dyn Participant, message: &StructuredText) -> bool;
}

/// A connected participant.
struct Session {
    participant: ParticipantRef,
    outbox: mpsc::UnboundedSender<StructuredText>,
    /// Connection order, used for deterministic iteration.
    sequence: u64,
    connected_at: DateTime<Utc>,
}

/// Registry of connected participants.
///
/// Shared across all connections.
#[derive(Default)]
pub struct SessionRegistry {
    /// Sessions indexed by participant id.
    sessions: RwLock<HashMap<Uuid, Session>>,
    next_sequence: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected participant.
    ///
    /// Returns the receiving end of the participant's outbox, or None if a
    /// session with the same id already exists.
    pub async fn connect(
        &self,
        participant: ParticipantRef,
    ) -> Option<mpsc::UnboundedReceiver<StructuredText>> {
        let id = participant.id();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return None;
        }

        let (outbox, inbox) = mpsc::unbounded_channel();
        debug!(participant = %id, username = participant.username(), "session opened");
        sessions.insert(
            id,
            Session {
                participant,
                outbox,
                sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                connected_at: Utc::now(),
            },
        );
        Some(inbox)
    }

    /// Remove a participant's session.
    ///
    /// Returns the participant if they were connected.
    pub async fn disconnect(&self, id: Uuid) -> Option<ParticipantRef> {
        let session = self.sessions.write().await.remove(&id)?;
        debug!(participant = %id, "session closed");
        Some(session.participant)
    }

    /// Get a connected participant by id.
    pub async fn get(&self, id: Uuid) -> Option<ParticipantRef> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.participant.clone())
    }

    /// Check if a participant is connected.
    pub async fn is_connected(&self, id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Get the number of connected participants.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get when a participant connected.
    pub async fn connected_at(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.sessions.read().await.get(&id).map(|s| s.connected_at)
    }

    /// Find a connected participant by display name or username.
    pub async fn find_by_name(
        &self,
        name: &str,
        metadata: &dyn MetadataStore,
    ) -> Option<ParticipantRef> {
        self.snapshot()
            .await
            .into_iter()
            .find(|p| matches_name(p.as_ref(), name, metadata))
    }

    /// Connected participants in connection order.
    pub async fn snapshot(&self) -> Vec<ParticipantRef> {
        let sessions = self.sessions.read().await;
        let mut ordered: Vec<&Session> = sessions.values().collect();
        ordered.sort_by_key(|s| s.sequence);
        ordered.into_iter().map(|s| s.participant.clone()).collect()
    }
}

#[async_trait]
impl DeliverySink for SessionRegistry {
    async fn participants(&self) -> Vec<ParticipantRef> {
        self.snapshot().await
    }

    async fn send(&self, recipient: &dyn Participant, message: &StructuredText) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(&recipient.id()) {
            Some(session) => session.outbox.send(message.clone()).is_ok(),
            None => false,
        }
    }
}

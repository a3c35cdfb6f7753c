//! Test helpers for integration tests.
//!
//! Provides a TestRelay wiring a coordinator to an in-memory session
//! registry, and TestClient for connected participants.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use gchat::participant::MemoryMetadataStore;
use gchat::placeholder::{MetadataPlaceholders, StandardPlaceholders};
use gchat::{
    BasicParticipant, BroadcastCoordinator, Config, ParticipantRef, PlaceholderRegistry,
    SessionRegistry, StructuredText,
};

/// Config with a single open chat format.
pub const BASIC_CONFIG: &str = r#"
[require_permission]
send_fail = ""

[formats.chat]
priority = 0
check_permission = false
format = "&7{username}&f: {message}"
"#;

/// A coordinator with its session registry and metadata store.
pub struct TestRelay {
    pub coordinator: Arc<BroadcastCoordinator>,
    pub sessions: Arc<SessionRegistry>,
    pub metadata: Arc<MemoryMetadataStore>,
}

impl TestRelay {
    /// Build a relay from TOML configuration.
    pub fn new(config: &str) -> Self {
        let config = Config::parse(config).expect("test config is valid");
        let metadata = Arc::new(MemoryMetadataStore::new());
        let placeholders = PlaceholderRegistry::new();
        placeholders.register(Arc::new(StandardPlaceholders::new(metadata.clone())));
        placeholders.register(Arc::new(MetadataPlaceholders::new(metadata.clone())));
        let sessions = Arc::new(SessionRegistry::new());

        let coordinator = BroadcastCoordinator::from_config(
            &config,
            Arc::new(placeholders),
            sessions.clone(),
            metadata.clone(),
        )
        .expect("coordinator builds");

        Self {
            coordinator: Arc::new(coordinator),
            sessions,
            metadata,
        }
    }

    /// Connect a participant.
    pub async fn connect(&self, participant: BasicParticipant) -> TestClient {
        let participant = participant.into_ref();
        let inbox = self
            .sessions
            .connect(participant.clone())
            .await
            .expect("participant not yet connected");
        TestClient { participant, inbox }
    }
}

/// A connected participant and their inbox.
pub struct TestClient {
    pub participant: ParticipantRef,
    inbox: UnboundedReceiver<StructuredText>,
}

impl TestClient {
    /// Take the next delivered message, if any.
    pub fn next(&mut self) -> Option<StructuredText> {
        self.inbox.try_recv().ok()
    }

    /// Take the plain text of every pending message.
    pub fn drain_plain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            out.push(message.plain_text());
        }
        out
    }

    /// Get the participant's username.
    pub fn name(&self) -> &str {
        self.participant.username()
    }
}

//! Extension points around a chat attempt.
//!
//! Three hook kinds, each with its own result contract:
//! - [`PreChatHook`]: runs once before anything else and may veto the attempt.
//! - [`MessageFormedHook`]: observes the built message; cannot change the outcome.
//! - [`RecipientHook`]: runs once per candidate recipient and may cancel or
//!   un-cancel delivery to that recipient.
//!
//! Subscribers of a kind run one after another in registration order and the
//! attempt waits for all of them.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::format::ChatFormat;
use crate::participant::ParticipantRef;
use crate::text::StructuredText;

/// A hook subscriber failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("hook '{hook}' failed: {reason}")]
pub struct HookError {
    pub hook: String,
    pub reason: String,
}

impl HookError {
    /// Create a new hook error.
    pub fn new(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            reason: reason.into(),
        }
    }
}

/// Verdict of a [`PreChatHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookDecision {
    #[default]
    Allow,
    Deny,
}

impl HookDecision {
    /// Check if the decision allows the attempt.
    pub fn is_allowed(&self) -> bool {
        matches!(self, HookDecision::Allow)
    }
}

/// Raw chat input, before any processing.
#[derive(Debug, Clone)]
pub struct PreChatEvent {
    pub sender: ParticipantRef,
    pub message: String,
}

/// A message that has been built and is about to be dispatched.
#[derive(Debug, Clone)]
pub struct MessageFormedEvent {
    pub sender: ParticipantRef,
    pub format: Arc<ChatFormat>,
    /// The sender's input after colour stripping.
    pub raw_message: String,
    pub message: StructuredText,
}

/// Delivery of a message to one recipient.
#[derive(Debug, Clone)]
pub struct RecipientEvent {
    pub sender: ParticipantRef,
    pub recipient: ParticipantRef,
    pub format: Arc<ChatFormat>,
    pub raw_message: String,
    cancelled: bool,
}

impl RecipientEvent {
    /// Create an event with the given default verdict.
    pub fn new(
        sender: ParticipantRef,
        recipient: ParticipantRef,
        format: Arc<ChatFormat>,
        raw_message: impl Into<String>,
        cancelled: bool,
    ) -> Self {
        Self {
            sender,
            recipient,
            format,
            raw_message: raw_message.into(),
            cancelled,
        }
    }

    /// Check if delivery is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancel or restore delivery.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Hook run before a chat attempt is processed.
#[async_trait]
pub trait PreChatHook: Send + Sync {
    async fn before_chat(&self, event: &PreChatEvent) -> Result<HookDecision, HookError>;
}

/// Hook run after the message is built.
#[async_trait]
pub trait MessageFormedHook: Send + Sync {
    async fn message_formed(&self, event: &MessageFormedEvent) -> Result<(), HookError>;
}

/// Hook run for each candidate recipient.
#[async_trait]
pub trait RecipientHook: Send + Sync {
    async fn before_delivery(&self, event: &mut RecipientEvent) -> Result<(), HookError>;
}

/// Registered subscribers of all three hook kinds.
#[derive(Default)]
pub struct HookBus {
    pre_chat: RwLock<Vec<Arc<dyn PreChatHook>>>,
    message_formed: RwLock<Vec<Arc<dyn MessageFormedHook>>>,
    recipient: RwLock<Vec<Arc<dyn RecipientHook>>>,
}

impl HookBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-chat subscriber.
    pub fn register_pre_chat(&self, hook: Arc<dyn PreChatHook>) {
        self.pre_chat
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Register a message-formed subscriber.
    pub fn register_message_formed(&self, hook: Arc<dyn MessageFormedHook>) {
        self.message_formed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Register a per-recipient subscriber.
    pub fn register_recipient(&self, hook: Arc<dyn RecipientHook>) {
        self.recipient
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Run every pre-chat subscriber.
    ///
    /// Denied if any subscriber denies. The first error aborts the phase.
    pub async fn fire_pre_chat(&self, event: &PreChatEvent) -> Result<HookDecision, HookError> {
        let hooks = snapshot(&self.pre_chat);
        let mut decision = HookDecision::Allow;
        for hook in hooks {
            if hook.before_chat(event).await? == HookDecision::Deny {
                decision = HookDecision::Deny;
            }
        }
        if !decision.is_allowed() {
            debug!(sender = %event.sender.id(), "chat vetoed by pre-chat hook");
        }
        Ok(decision)
    }

    /// Run every message-formed subscriber.
    pub async fn fire_message_formed(&self, event: &MessageFormedEvent) -> Result<(), HookError> {
        for hook in snapshot(&self.message_formed) {
            hook.message_formed(event).await?;
        }
        Ok(())
    }

    /// Run every per-recipient subscriber, each seeing the previous verdict.
    pub async fn fire_recipient(&self, event: &mut RecipientEvent) -> Result<(), HookError> {
        for hook in snapshot(&self.recipient) {
            hook.before_delivery(event).await?;
        }
        Ok(())
    }
}

/// Clone the subscriber list so no lock is held across awaits.
fn snapshot<T: ?Sized>(hooks: &RwLock<Vec<Arc<T>>>) -> Vec<Arc<T>> {
    hooks
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

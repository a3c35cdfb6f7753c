//! gChat - chat formatting and broadcast for a multi-server relay
//!
//! Incoming chat is matched to a format, placeholders are substituted, the
//! result is rendered into structured text and fanned out to every connected
//! participant, with hooks able to veto or filter delivery.

pub mod chat;
pub mod config;
pub mod error;
pub mod format;
pub mod hooks;
pub mod logging;
pub mod message;
pub mod participant;
pub mod placeholder;
pub mod text;

pub use chat::{BroadcastCoordinator, ChatAttempt, ChatOutcome, ChatPolicy, DenyReason};
pub use config::Config;
pub use error::{GChatError, Result};
pub use format::{ChatFormat, ClickKind, FormatRegistry};
pub use hooks::{HookBus, HookDecision, HookError, MessageFormedHook, PreChatHook, RecipientHook};
pub use message::MessageBuilder;
pub use participant::{BasicParticipant, Participant, ParticipantRef, SessionRegistry};
pub use placeholder::{PlaceholderProvider, PlaceholderRegistry};
pub use text::{LegacyRenderer, Renderer, StructuredText};

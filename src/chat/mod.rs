//! Chat module for gChat.
//!
//! This module ties the pipeline together:
//! - [`BroadcastCoordinator`] runs chat attempts from input to delivery
//! - Lifecycle broadcasts (login, join, logout)
//! - Direct formatting for `me` and `whisper`
//! - [`ChatPolicy`] and attempt outcomes

mod coordinator;
mod direct;
mod policy;

pub use coordinator::BroadcastCoordinator;
pub use direct::{
    Whisper, JOIN_CONTEXT, LOGIN_CONTEXT, LOGOUT_CONTEXT, ME_CONTEXT, WHISPER_CONTEXT,
    WHISPER_OUT_CONTEXT,
};
pub use policy::{
    strip_colors, ChatAttempt, ChatOutcome, ChatPolicy, DenyReason, COLOR_PERMISSION,
    RECEIVE_PERMISSION, SEND_PERMISSION,
};

//! Lifecycle broadcasts and direct formatting (me / whisper).
//!
//! These paths format with a named context instead of the chat context and
//! do not run the chat hooks.

use std::collections::HashMap;

use tracing::debug;

use super::coordinator::BroadcastCoordinator;
use super::policy::{strip_colors, COLOR_PERMISSION};
use crate::participant::{display_name, matches_name, Participant, ParticipantRef};
use crate::placeholder::MESSAGE_TOKEN;
use crate::text::StructuredText;
use crate::{GChatError, Result};

pub const LOGIN_CONTEXT: &str = "login";
pub const JOIN_CONTEXT: &str = "join";
pub const LOGOUT_CONTEXT: &str = "logout";
pub const ME_CONTEXT: &str = "me";
/// Context of the copy a whisper's receiver sees.
pub const WHISPER_CONTEXT: &str = "whisper";
/// Context of the copy a whisper's sender sees.
pub const WHISPER_OUT_CONTEXT: &str = "whisper_out";

/// Token replaced with the server name in join messages.
const SERVER_TOKEN: &str = "server";

/// Delivered copies of a whisper.
#[derive(Debug, Clone)]
pub struct Whisper {
    pub receiver: ParticipantRef,
    /// Copy shown to the sender.
    pub outgoing: StructuredText,
    /// Copy shown to the receiver.
    pub incoming: StructuredText,
}

impl BroadcastCoordinator {
    /// Format a participant with a context's format and literal params.
    ///
    /// A `message` param becomes the body. Returns None when the context has
    /// no usable format or rendering fails without fallback.
    pub fn format_direct(
        &self,
        participant: &dyn Participant,
        context: &str,
        params: &HashMap<String, String>,
    ) -> Option<StructuredText> {
        let format = self.formats.select_format(participant, Some(context))?;
        let body = params.get(MESSAGE_TOKEN).map(String::as_str).unwrap_or("");
        self.render(participant, &format, body, Some(params), &self.policy())
    }

    /// Announce that a participant logged in.
    ///
    /// Returns the number of recipients.
    pub async fn broadcast_login(&self, participant: &ParticipantRef) -> usize {
        self.broadcast_lifecycle(participant, LOGIN_CONTEXT, HashMap::new())
            .await
    }

    /// Announce that a participant joined a server.
    pub async fn broadcast_join(&self, participant: &ParticipantRef, server: &str) -> usize {
        let mut params = HashMap::new();
        params.insert(SERVER_TOKEN.to_string(), server.to_string());
        self.broadcast_lifecycle(participant, JOIN_CONTEXT, params)
            .await
    }

    /// Announce that a participant logged out.
    pub async fn broadcast_logout(&self, participant: &ParticipantRef) -> usize {
        self.broadcast_lifecycle(participant, LOGOUT_CONTEXT, HashMap::new())
            .await
    }

    async fn broadcast_lifecycle(
        &self,
        participant: &ParticipantRef,
        context: &str,
        params: HashMap<String, String>,
    ) -> usize {
        let Some(text) = self.format_direct(participant.as_ref(), context, &params) else {
            debug!(participant = %participant.id(), context, "no lifecycle format");
            return 0;
        };
        self.broadcast(&text).await
    }

    /// Broadcast an action message to everyone, the sender included.
    pub async fn me(&self, sender: &ParticipantRef, message: &str) -> Result<usize> {
        let message = sanitize(sender.as_ref(), message)?;
        let mut params = HashMap::new();
        params.insert(MESSAGE_TOKEN.to_string(), message);

        let text = self
            .format_direct(sender.as_ref(), ME_CONTEXT, &params)
            .ok_or_else(|| GChatError::NotFound(format!("format for context '{ME_CONTEXT}'")))?;
        Ok(self.broadcast(&text).await)
    }

    /// Send a private message to a connected participant.
    ///
    /// `receiver` is matched against display names and usernames. The
    /// sender's copy uses the sender's `whisper_out` format; the receiver's
    /// copy uses the receiver's `whisper` format and placeholders.
    pub async fn whisper(
        &self,
        sender: &ParticipantRef,
        receiver: &str,
        message: &str,
    ) -> Result<Whisper> {
        let message = sanitize(sender.as_ref(), message)?;
        let metadata = self.metadata.as_ref();
        let target = self
            .sink
            .participants()
            .await
            .into_iter()
            .find(|p| matches_name(p.as_ref(), receiver, metadata))
            .ok_or_else(|| GChatError::NotFound(format!("participant '{}'", receiver.trim())))?;

        let mut params = HashMap::new();
        params.insert(MESSAGE_TOKEN.to_string(), message);
        params.insert("sender".to_string(), display_name(sender.as_ref(), metadata));
        params.insert("receiver".to_string(), display_name(target.as_ref(), metadata));

        let outgoing = self
            .format_direct(sender.as_ref(), WHISPER_OUT_CONTEXT, &params)
            .ok_or_else(|| {
                GChatError::NotFound(format!("format for context '{WHISPER_OUT_CONTEXT}'"))
            })?;
        let incoming = self
            .format_direct(target.as_ref(), WHISPER_CONTEXT, &params)
            .ok_or_else(|| {
                GChatError::Permission(format!(
                    "{} can't receive whispers",
                    display_name(target.as_ref(), metadata)
                ))
            })?;

        self.sink.send(target.as_ref(), &incoming).await;
        self.sink.send(sender.as_ref(), &outgoing).await;
        debug!(sender = %sender.id(), receiver = %target.id(), "whisper delivered");

        Ok(Whisper {
            receiver: target,
            outgoing,
            incoming,
        })
    }
}

/// Reject empty messages and strip colours the sender may not use.
fn sanitize(sender: &dyn Participant, message: &str) -> Result<String> {
    if message.trim().is_empty() {
        return Err(GChatError::Validation("message is empty".to_string()));
    }
    Ok(if sender.has_permission(COLOR_PERMISSION) {
        message.to_string()
    } else {
        strip_colors(message)
    })
}

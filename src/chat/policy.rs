//! Global chat policy and attempt outcomes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use uuid::Uuid;

use crate::config::Config;
use crate::format::ChatFormat;
use crate::text::{Renderer, StructuredText};
use crate::Result;

/// Permission required to chat when sending is restricted.
pub const SEND_PERMISSION: &str = "gchat.send";

/// Permission required to see chat when receiving is restricted.
pub const RECEIVE_PERMISSION: &str = "gchat.receive";

/// Permission to use colour codes in chat.
pub const COLOR_PERMISSION: &str = "gchat.color";

/// Colour and format codes, `&#rrggbb` included.
static COLOR_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[§&](?:#[0-9a-f]{6}|[0-9a-fk-or])").expect("colour code pattern is valid")
});

/// Remove colour and format codes from participant input.
pub fn strip_colors(text: &str) -> String {
    COLOR_CODE_PATTERN.replace_all(text, "").into_owned()
}

/// Policy flags of the active configuration.
#[derive(Debug, Clone)]
pub struct ChatPolicy {
    /// Let messages without a usable format continue unformatted.
    pub passthrough: bool,
    pub require_send: bool,
    /// Message delivered to a sender lacking the send permission.
    pub send_fail: Option<StructuredText>,
    pub require_receive: bool,
    /// Let messages from senders lacking the send permission continue unformatted.
    pub permission_passthrough: bool,
    pub log_chat_global: bool,
    /// Markup prepended to the sender's own copy of the body.
    pub echo_prefix: String,
    pub plain_text_fallback: bool,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            passthrough: true,
            require_send: false,
            send_fail: None,
            require_receive: false,
            permission_passthrough: true,
            log_chat_global: true,
            echo_prefix: "&b".to_string(),
            plain_text_fallback: true,
        }
    }
}

impl ChatPolicy {
    /// Build the policy of a configuration.
    ///
    /// The send-fail message is rendered up front; malformed markup is
    /// rejected with [`crate::GChatError::Render`].
    pub fn from_config(config: &Config, renderer: &dyn Renderer) -> Result<Self> {
        let send_fail = match config.require_permission.send_fail.as_str() {
            "" => None,
            markup => {
                renderer.validate(markup)?;
                Some(renderer.parse(markup)?)
            }
        };

        Ok(Self {
            passthrough: config.chat.passthrough,
            require_send: config.require_permission.send,
            send_fail,
            require_receive: config.require_permission.receive,
            permission_passthrough: config.require_permission.passthrough,
            log_chat_global: config.chat.log_chat_global,
            echo_prefix: config.chat.echo_prefix.clone(),
            plain_text_fallback: config.chat.plain_text_fallback,
        })
    }
}

/// Why an attempt was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// A pre-chat hook vetoed the attempt.
    HookVeto,
    MissingSendPermission,
    /// No usable format and passthrough is off.
    NoFormat,
    /// The message could not be rendered and plain-text fallback is off.
    RenderFailure,
    /// A hook subscriber returned an error.
    HookFailure,
}

impl DenyReason {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::HookVeto => "hook_veto",
            DenyReason::MissingSendPermission => "missing_send_permission",
            DenyReason::NoFormat => "no_format",
            DenyReason::RenderFailure => "render_failure",
            DenyReason::HookFailure => "hook_failure",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a chat attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatOutcome {
    #[default]
    Pending,
    Denied(DenyReason),
    /// The caller should forward the raw message to its original destination.
    Passthrough,
    /// The message was handed to this many recipients.
    Delivered { recipients: usize },
}

impl ChatOutcome {
    /// Check if the attempt was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, ChatOutcome::Denied(_))
    }

    /// Check if the raw message should pass through.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, ChatOutcome::Passthrough)
    }

    /// Check if the message was broadcast.
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChatOutcome::Delivered { .. })
    }
}

/// One processed chat message.
#[derive(Debug, Clone)]
pub struct ChatAttempt {
    pub sender: Uuid,
    pub raw_message: String,
    /// Format used, once resolved.
    pub format: Option<Arc<ChatFormat>>,
    pub outcome: ChatOutcome,
    /// Per-recipient verdicts: true if the recipient was allowed.
    pub decisions: HashMap<Uuid, bool>,
}

impl ChatAttempt {
    /// Start a pending attempt.
    pub fn new(sender: Uuid, raw_message: impl Into<String>) -> Self {
        Self {
            sender,
            raw_message: raw_message.into(),
            format: None,
            outcome: ChatOutcome::Pending,
            decisions: HashMap::new(),
        }
    }

    /// Check if a recipient was allowed. None if they were never considered.
    pub fn allowed(&self, recipient: Uuid) -> Option<bool> {
        self.decisions.get(&recipient).copied()
    }

    pub(crate) fn finish(mut self, outcome: ChatOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

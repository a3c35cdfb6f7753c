//! Chat formats for gChat.
//!
//! A [`ChatFormat`] is an immutable template describing how a message is
//! rendered: body markup, optional hover text and optional click action.
//! Formats are grouped per context (chat, login, join, ...) in a
//! [`FormatRegistry`].

mod registry;

use std::fmt;
use std::str::FromStr;

use crate::participant::Participant;
use crate::text::ClickAction;
use crate::GChatError;

pub use registry::{FormatContexts, FormatRegistry, FormatSet, CHAT_CONTEXT};

/// Click behaviour of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClickKind {
    #[default]
    None,
    SuggestCommand,
    RunCommand,
    OpenUrl,
}

impl ClickKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickKind::None => "none",
            ClickKind::SuggestCommand => "suggest_command",
            ClickKind::RunCommand => "run_command",
            ClickKind::OpenUrl => "open_url",
        }
    }

    /// The click action, or None for [`ClickKind::None`].
    pub fn action(&self) -> Option<ClickAction> {
        match self {
            ClickKind::None => None,
            ClickKind::SuggestCommand => Some(ClickAction::SuggestCommand),
            ClickKind::RunCommand => Some(ClickAction::RunCommand),
            ClickKind::OpenUrl => Some(ClickAction::OpenUrl),
        }
    }
}

impl FromStr for ClickKind {
    type Err = GChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(ClickKind::None),
            "suggest_command" => Ok(ClickKind::SuggestCommand),
            "run_command" => Ok(ClickKind::RunCommand),
            "open_url" => Ok(ClickKind::OpenUrl),
            other => Err(GChatError::Config(format!("invalid click type: {other}"))),
        }
    }
}

impl fmt::Display for ClickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Click action of a format together with its value template.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClickTemplate {
    action: ClickAction,
    value: String,
}

/// A named chat format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFormat {
    id: String,
    priority: i32,
    check_permission: bool,
    body_template: String,
    hover_template: Option<String>,
    click: Option<ClickTemplate>,
}

impl ChatFormat {
    /// Create a format without hover or click.
    ///
    /// The id is lower-cased.
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        check_permission: bool,
        body_template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into().to_lowercase(),
            priority,
            check_permission,
            body_template: body_template.into(),
            hover_template: None,
            click: None,
        }
    }

    /// Set the hover template. Empty templates are ignored.
    pub fn with_hover(mut self, hover: impl Into<String>) -> Self {
        let hover = hover.into();
        self.hover_template = (!hover.is_empty()).then_some(hover);
        self
    }

    /// Set the click behaviour.
    ///
    /// A kind other than [`ClickKind::None`] requires a value.
    pub fn with_click(mut self, kind: ClickKind, value: Option<String>) -> crate::Result<Self> {
        self.click = match (kind.action(), value) {
            (None, _) => None,
            (Some(action), Some(value)) => Some(ClickTemplate { action, value }),
            (Some(_), None) => {
                return Err(GChatError::Config(format!(
                    "format '{}': click type {kind} requires a value",
                    self.id
                )))
            }
        };
        Ok(self)
    }

    /// Get the format id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the priority. Higher wins.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Check if the format is gated by a permission.
    pub fn check_permission(&self) -> bool {
        self.check_permission
    }

    /// Get the body markup, containing `{message}`.
    pub fn body_template(&self) -> &str {
        &self.body_template
    }

    /// Get the hover markup.
    pub fn hover_template(&self) -> Option<&str> {
        self.hover_template.as_deref()
    }

    /// Get the click kind.
    pub fn click_kind(&self) -> ClickKind {
        match self.click.as_ref().map(|c| c.action) {
            None => ClickKind::None,
            Some(ClickAction::SuggestCommand) => ClickKind::SuggestCommand,
            Some(ClickAction::RunCommand) => ClickKind::RunCommand,
            Some(ClickAction::OpenUrl) => ClickKind::OpenUrl,
        }
    }

    /// Get the click value template. Present exactly when the kind is not none.
    pub fn click_value_template(&self) -> Option<&str> {
        self.click.as_ref().map(|c| c.value.as_str())
    }

    /// Permission node gating this format.
    pub fn permission(&self) -> String {
        format!("format.{}", self.id)
    }

    /// Check if a participant may use this format.
    pub fn can_use(&self, participant: &dyn Participant) -> bool {
        !self.check_permission || participant.has_permission(&self.permission())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::BasicParticipant;

    #[test]
    fn test_click_kind_parse() {
        assert_eq!("none".parse::<ClickKind>().unwrap(), ClickKind::None);
        assert_eq!(
            "SUGGEST_COMMAND".parse::<ClickKind>().unwrap(),
            ClickKind::SuggestCommand
        );
        assert_eq!("run_command".parse::<ClickKind>().unwrap(), ClickKind::RunCommand);
        assert_eq!("open_url".parse::<ClickKind>().unwrap(), ClickKind::OpenUrl);

        let err = "copy_to_clipboard".parse::<ClickKind>().unwrap_err();
        assert!(err.to_string().contains("invalid click type"));
    }

    #[test]
    fn test_click_kind_action() {
        assert!(ClickKind::None.action().is_none());
        assert_eq!(ClickKind::OpenUrl.action(), Some(ClickAction::OpenUrl));
    }

    #[test]
    fn test_new_lowercases_id() {
        let format = ChatFormat::new("VIP", 10, true, "{message}");
        assert_eq!(format.id(), "vip");
        assert_eq!(format.permission(), "format.vip");
        assert_eq!(format.priority(), 10);
        assert!(format.check_permission());
        assert_eq!(format.click_kind(), ClickKind::None);
        assert!(format.click_value_template().is_none());
        assert!(format.hover_template().is_none());
    }

    #[test]
    fn test_with_hover_ignores_empty() {
        let format = ChatFormat::new("a", 0, false, "").with_hover("");
        assert!(format.hover_template().is_none());
        let format = format.with_hover("&7hi");
        assert_eq!(format.hover_template(), Some("&7hi"));
    }

    #[test]
    fn test_with_click() {
        let format = ChatFormat::new("a", 0, false, "")
            .with_click(ClickKind::OpenUrl, Some("http://x".to_string()))
            .unwrap();
        assert_eq!(format.click_kind(), ClickKind::OpenUrl);
        assert_eq!(format.click_value_template(), Some("http://x"));
    }

    #[test]
    fn test_with_click_none_drops_value() {
        let format = ChatFormat::new("a", 0, false, "")
            .with_click(ClickKind::None, Some("ignored".to_string()))
            .unwrap();
        assert_eq!(format.click_kind(), ClickKind::None);
        assert!(format.click_value_template().is_none());
    }

    #[test]
    fn test_with_click_requires_value() {
        let result = ChatFormat::new("a", 0, false, "").with_click(ClickKind::RunCommand, None);
        assert!(matches!(result, Err(GChatError::Config(_))));
    }

    #[test]
    fn test_can_use() {
        let open = ChatFormat::new("default", 0, false, "{message}");
        let gated = ChatFormat::new("vip", 10, true, "{message}");
        let plain = BasicParticipant::new("Ann");
        let vip = BasicParticipant::new("Bob").with_permission("format.vip");

        assert!(open.can_use(&plain));
        assert!(!gated.can_use(&plain));
        assert!(gated.can_use(&vip));
    }
}

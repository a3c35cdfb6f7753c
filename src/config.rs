//! Configuration module for gChat.
//!
//! The configuration is a TOML document. `[require_permission]` and
//! `[formats]` are required; every other section falls back to defaults.
//!
//! ```toml
//! [require_permission]
//! send = false
//! send_fail = "&cYou do not have permission to talk in chat!"
//!
//! [formats.default]
//! priority = 0
//! check_permission = false
//! format = "&7{username}&f: {message}"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::format::{ChatFormat, ClickKind, FormatContexts, FormatSet, CHAT_CONTEXT};
use crate::text::{Style, TextColor};
use crate::{GChatError, Result};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/gchat.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Global chat policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Let messages without a usable format continue unformatted.
    #[serde(default = "default_true")]
    pub passthrough: bool,
    /// Log every broadcast chat message.
    #[serde(default = "default_true")]
    pub log_chat_global: bool,
    /// Markup prepended to the sender's own copy of the body.
    #[serde(default = "default_echo_prefix")]
    pub echo_prefix: String,
    /// Deliver unparsed markup as plain text when rendering fails.
    #[serde(default = "default_true")]
    pub plain_text_fallback: bool,
}

fn default_true() -> bool {
    true
}

fn default_echo_prefix() -> String {
    "&b".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            passthrough: true,
            log_chat_global: true,
            echo_prefix: default_echo_prefix(),
            plain_text_fallback: true,
        }
    }
}

/// Send/receive permission requirements.
#[derive(Debug, Clone, Deserialize)]
pub struct RequirePermissionConfig {
    /// Require `gchat.send` to chat.
    #[serde(default)]
    pub send: bool,
    /// Markup sent to a participant lacking `gchat.send`. Empty sends nothing.
    pub send_fail: String,
    /// Require `gchat.receive` to see chat.
    #[serde(default)]
    pub receive: bool,
    /// Let messages from participants lacking `gchat.send` continue unformatted.
    #[serde(default = "default_true")]
    pub passthrough: bool,
}

impl Default for RequirePermissionConfig {
    fn default() -> Self {
        Self {
            send: false,
            send_fail: String::new(),
            receive: false,
            passthrough: true,
        }
    }
}

/// Style of links extracted from chat text.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkStyleConfig {
    /// Colour name or `#rrggbb`.
    #[serde(default = "default_link_color")]
    pub color: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default = "default_true")]
    pub underlined: bool,
}

fn default_link_color() -> String {
    "white".to_string()
}

impl Default for LinkStyleConfig {
    fn default() -> Self {
        Self {
            color: default_link_color(),
            bold: false,
            italic: false,
            underlined: true,
        }
    }
}

impl LinkStyleConfig {
    /// Convert into a text style.
    pub fn to_style(&self) -> Result<Style> {
        let color = TextColor::from_name(&self.color).ok_or_else(|| {
            GChatError::Config(format!("link_style: unknown colour '{}'", self.color))
        })?;
        Ok(Style {
            color: Some(color),
            bold: self.bold,
            italic: self.italic,
            underlined: self.underlined,
            ..Style::default()
        })
    }
}

/// Click behaviour of a format.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickConfig {
    /// none, suggest_command, run_command or open_url.
    #[serde(rename = "type", default = "default_click_type")]
    pub kind: String,
    /// Command or URL template. Required unless the type is none.
    #[serde(default)]
    pub value: Option<String>,
}

fn default_click_type() -> String {
    "none".to_string()
}

/// A single format entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
    #[serde(default)]
    pub priority: i32,
    /// Gate the format behind `format.<id>`.
    #[serde(default = "default_true")]
    pub check_permission: bool,
    /// Body markup.
    pub format: String,
    /// Hover markup.
    #[serde(default)]
    pub hover: Option<String>,
    #[serde(default)]
    pub click: Option<ClickConfig>,
}

impl FormatConfig {
    /// Build the format with the given id.
    pub fn to_format(&self, id: &str) -> Result<ChatFormat> {
        let format = ChatFormat::new(id, self.priority, self.check_permission, &self.format)
            .with_hover(self.hover.clone().unwrap_or_default());
        match &self.click {
            Some(click) => {
                let kind: ClickKind = click.kind.parse().map_err(|_| {
                    GChatError::Config(format!(
                        "format '{id}': invalid click type: {}",
                        click.kind
                    ))
                })?;
                format.with_click(kind, click.value.clone())
            }
            None => Ok(format),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    pub require_permission: RequirePermissionConfig,
    #[serde(default)]
    pub link_style: LinkStyleConfig,
    /// Formats of the chat context, keyed by id.
    pub formats: BTreeMap<String, FormatConfig>,
    /// Formats of other contexts (login, join, logout, me, whisper, ...).
    #[serde(default)]
    pub contexts: BTreeMap<String, BTreeMap<String, FormatConfig>>,
}

impl Default for Config {
    fn default() -> Self {
        let mut formats = BTreeMap::new();
        formats.insert(
            "default".to_string(),
            FormatConfig {
                priority: 0,
                check_permission: false,
                format: "&7{username}&f: {message}".to_string(),
                hover: None,
                click: None,
            },
        );
        Self {
            logging: LoggingConfig::default(),
            chat: ChatConfig::default(),
            require_permission: RequirePermissionConfig::default(),
            link_style: LinkStyleConfig::default(),
            formats,
            contexts: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GChatError::Io)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| GChatError::Config(format!("config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.contexts.contains_key(CHAT_CONTEXT) {
            return Err(GChatError::Config(format!(
                "context '{CHAT_CONTEXT}' must be configured under [formats]"
            )));
        }
        self.link_style.to_style()?;
        self.to_format_contexts()?;
        Ok(())
    }

    /// Build the format sets of every context.
    pub fn to_format_contexts(&self) -> Result<FormatContexts> {
        let mut contexts = FormatContexts::new().with_context(CHAT_CONTEXT, build_set(&self.formats)?);
        for (name, formats) in &self.contexts {
            contexts = contexts.with_context(name, build_set(formats)?);
        }
        Ok(contexts)
    }
}

fn build_set(formats: &BTreeMap<String, FormatConfig>) -> Result<FormatSet> {
    let formats = formats
        .iter()
        .map(|(id, format)| format.to_format(id))
        .collect::<Result<Vec<_>>>()?;
    FormatSet::new(formats)
}

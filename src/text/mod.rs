//! Structured rich text for gChat.
//!
//! Chat output is a tree of [`TextNode`]s. Each node carries its own text,
//! a [`Style`], optional hover and click events, and ordered children.
//!
//! # Features
//!
//! - Legacy `&`/`§` colour and format codes via [`LegacyRenderer`]
//! - `&#rrggbb` hex colours; malformed ones stay literal and
//!   [`Renderer::validate`] reports them
//! - Automatic link extraction with a configurable link style
//! - Plain-text flattening for logs
//! - Non-destructive decoration: [`TextNode::decorate`] returns a new tree
//!
//! # Example
//!
//! ```
//! use gchat::text::{LegacyRenderer, Renderer};
//!
//! let renderer = LegacyRenderer::new();
//! let text = renderer.parse("&7Ann&f: hello").unwrap();
//! assert_eq!(text.plain_text(), "Ann: hello");
//! ```

mod legacy;

use std::fmt;

use thiserror::Error;

pub use legacy::{default_link_style, LegacyRenderer};

/// Root of a rendered message.
pub type StructuredText = TextNode;

/// Errors raised while turning markup into a text tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A `&#` sequence was not followed by six hex digits.
    #[error("malformed hex colour '{sequence}' at offset {position}")]
    MalformedHexColor { position: usize, sequence: String },
}

/// Text colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
    /// 24-bit colour.
    Rgb(u8, u8, u8),
}

/// Named colours in legacy code order (`0`..`f`).
const NAMED_COLORS: [(TextColor, &str); 16] = [
    (TextColor::Black, "black"),
    (TextColor::DarkBlue, "dark_blue"),
    (TextColor::DarkGreen, "dark_green"),
    (TextColor::DarkAqua, "dark_aqua"),
    (TextColor::DarkRed, "dark_red"),
    (TextColor::DarkPurple, "dark_purple"),
    (TextColor::Gold, "gold"),
    (TextColor::Gray, "gray"),
    (TextColor::DarkGray, "dark_gray"),
    (TextColor::Blue, "blue"),
    (TextColor::Green, "green"),
    (TextColor::Aqua, "aqua"),
    (TextColor::Red, "red"),
    (TextColor::LightPurple, "light_purple"),
    (TextColor::Yellow, "yellow"),
    (TextColor::White, "white"),
];

impl TextColor {
    /// Colour for a legacy code character (`0`-`9`, `a`-`f`, any case).
    pub fn from_legacy_code(code: char) -> Option<Self> {
        let index = code.to_digit(16)? as usize;
        Some(NAMED_COLORS[index].0)
    }

    /// Parse a colour name (`dark_red`) or `#rrggbb`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        if let Some(hex) = name.strip_prefix('#') {
            return parse_hex(hex);
        }
        NAMED_COLORS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(color, _)| *color)
    }

    /// Get string representation.
    pub fn name(&self) -> String {
        match self {
            TextColor::Rgb(r, g, b) => format!("#{r:02x}{g:02x}{b:02x}"),
            named => NAMED_COLORS
                .iter()
                .find(|(color, _)| color == named)
                .map(|(_, n)| (*n).to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse six hex digits into an RGB colour.
fn parse_hex(hex: &str) -> Option<TextColor> {
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    Some(TextColor::Rgb(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
    ))
}

/// Colour and decorations of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub color: Option<TextColor>,
    pub bold: bool,
    pub italic: bool,
    pub underlined: bool,
    pub strikethrough: bool,
    pub obfuscated: bool,
}

impl Style {
    /// Style with only a colour set.
    pub fn colored(color: TextColor) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    /// Overlay `other` on top of this style.
    ///
    /// The colour is replaced when `other` has one; decorations are combined.
    pub fn merge(&self, other: &Style) -> Style {
        Style {
            color: other.color.or(self.color),
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underlined: self.underlined || other.underlined,
            strikethrough: self.strikethrough || other.strikethrough,
            obfuscated: self.obfuscated || other.obfuscated,
        }
    }
}

/// Action performed when a node is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickAction {
    SuggestCommand,
    RunCommand,
    OpenUrl,
}

impl ClickAction {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickAction::SuggestCommand => "suggest_command",
            ClickAction::RunCommand => "run_command",
            ClickAction::OpenUrl => "open_url",
        }
    }
}

impl fmt::Display for ClickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Click event attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub action: ClickAction,
    pub value: String,
}

impl ClickEvent {
    /// Create a new click event.
    pub fn new(action: ClickAction, value: impl Into<String>) -> Self {
        Self {
            action,
            value: value.into(),
        }
    }

    /// Click event opening a URL.
    pub fn open_url(url: impl Into<String>) -> Self {
        Self::new(ClickAction::OpenUrl, url)
    }
}

/// Hover event attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverEvent {
    /// Show a text tooltip.
    ShowText(Box<TextNode>),
}

impl HoverEvent {
    /// Tooltip showing the given text.
    pub fn show_text(text: TextNode) -> Self {
        HoverEvent::ShowText(Box::new(text))
    }
}

/// A node in a structured text tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextNode {
    /// Literal text of this node (may be empty for container nodes).
    pub content: String,
    pub style: Style,
    pub hover: Option<HoverEvent>,
    pub click: Option<ClickEvent>,
    pub children: Vec<TextNode>,
}

impl TextNode {
    /// Create an undecorated node.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Create an empty container node.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the style.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Set the hover event.
    pub fn with_hover(mut self, hover: HoverEvent) -> Self {
        self.hover = Some(hover);
        self
    }

    /// Set the click event.
    pub fn with_click(mut self, click: ClickEvent) -> Self {
        self.click = Some(click);
        self
    }

    /// Append a child node.
    pub fn push(&mut self, child: TextNode) {
        self.children.push(child);
    }

    /// Append a child node (builder form).
    pub fn with_child(mut self, child: TextNode) -> Self {
        self.children.push(child);
        self
    }

    /// Check if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Flatten the tree into its text content, depth first.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        out.push_str(&self.content);
        for child in &self.children {
            child.write_plain(out);
        }
    }

    /// All nodes of the tree in pre-order, starting with `self`.
    pub fn nodes(&self) -> Vec<&TextNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.nodes());
        }
        out
    }

    /// All leaf nodes in order.
    pub fn leaves(&self) -> Vec<&TextNode> {
        self.nodes().into_iter().filter(|n| n.is_leaf()).collect()
    }

    /// Build a copy of this tree with the given decorations applied deeply.
    ///
    /// Every node whose hover (click) is absent receives `hover` (`click`).
    /// Nodes that already carry one keep it. `self` is left untouched.
    pub fn decorate(&self, hover: Option<&HoverEvent>, click: Option<&ClickEvent>) -> TextNode {
        TextNode {
            content: self.content.clone(),
            style: self.style,
            hover: self.hover.clone().or_else(|| hover.cloned()),
            click: self.click.clone().or_else(|| click.cloned()),
            children: self
                .children
                .iter()
                .map(|child| child.decorate(hover, click))
                .collect(),
        }
    }
}

/// Converts markup into structured text.
pub trait Renderer: Send + Sync {
    /// Parse markup into a text tree.
    fn parse(&self, markup: &str) -> Result<TextNode, RenderError>;

    /// Check operator-written markup.
    ///
    /// May reject input that [`Renderer::parse`] accepts leniently.
    fn validate(&self, markup: &str) -> Result<(), RenderError> {
        self.parse(markup).map(|_| ())
    }

    /// Flatten a tree into plain text.
    fn plain_text(&self, text: &TextNode) -> String {
        text.plain_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TextNode {
        TextNode::empty()
            .with_child(TextNode::text("Ann").with_style(Style::colored(TextColor::Gray)))
            .with_child(
                TextNode::text(": ")
                    .with_child(TextNode::text("https://example.org").with_click(ClickEvent::open_url("https://example.org"))),
            )
    }

    #[test]
    fn test_color_from_legacy_code() {
        assert_eq!(TextColor::from_legacy_code('0'), Some(TextColor::Black));
        assert_eq!(TextColor::from_legacy_code('7'), Some(TextColor::Gray));
        assert_eq!(TextColor::from_legacy_code('b'), Some(TextColor::Aqua));
        assert_eq!(TextColor::from_legacy_code('F'), Some(TextColor::White));
        assert_eq!(TextColor::from_legacy_code('g'), None);
    }

    #[test]
    fn test_color_from_name() {
        assert_eq!(TextColor::from_name("dark_red"), Some(TextColor::DarkRed));
        assert_eq!(TextColor::from_name(" WHITE "), Some(TextColor::White));
        assert_eq!(
            TextColor::from_name("#ff8000"),
            Some(TextColor::Rgb(0xff, 0x80, 0x00))
        );
        assert_eq!(TextColor::from_name("#ff80"), None);
        assert_eq!(TextColor::from_name("mauve"), None);
    }

    #[test]
    fn test_color_name() {
        assert_eq!(TextColor::LightPurple.name(), "light_purple");
        assert_eq!(TextColor::Rgb(1, 2, 3).to_string(), "#010203");
    }

    #[test]
    fn test_style_merge() {
        let base = Style {
            color: Some(TextColor::Gray),
            bold: true,
            ..Style::default()
        };
        let link = Style {
            color: Some(TextColor::White),
            underlined: true,
            ..Style::default()
        };
        let merged = base.merge(&link);
        assert_eq!(merged.color, Some(TextColor::White));
        assert!(merged.bold);
        assert!(merged.underlined);

        let keep = base.merge(&Style::default());
        assert_eq!(keep.color, Some(TextColor::Gray));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(sample_tree().plain_text(), "Ann: https://example.org");
    }

    #[test]
    fn test_nodes_and_leaves() {
        let tree = sample_tree();
        assert_eq!(tree.nodes().len(), 4);
        let leaves: Vec<&str> = tree.leaves().iter().map(|n| n.content.as_str()).collect();
        assert_eq!(leaves, vec!["Ann", "https://example.org"]);
    }

    #[test]
    fn test_decorate_fills_missing_only() {
        let tree = sample_tree();
        let hover = HoverEvent::show_text(TextNode::text("Sent by Ann"));
        let click = ClickEvent::new(ClickAction::SuggestCommand, "/msg Ann ");

        let decorated = tree.decorate(Some(&hover), Some(&click));

        for node in decorated.nodes() {
            assert_eq!(node.hover.as_ref(), Some(&hover));
        }
        assert_eq!(decorated.children[0].click.as_ref(), Some(&click));
        assert_eq!(
            decorated.children[1].children[0].click,
            Some(ClickEvent::open_url("https://example.org"))
        );
    }

    #[test]
    fn test_decorate_does_not_mutate_source() {
        let tree = sample_tree();
        let click = ClickEvent::new(ClickAction::RunCommand, "/spawn");
        let _ = tree.decorate(None, Some(&click));
        assert!(tree.children[0].click.is_none());
        assert!(tree.hover.is_none());
    }

    #[test]
    fn test_decorate_with_nothing_is_identity() {
        let tree = sample_tree();
        assert_eq!(tree.decorate(None, None), tree);
    }
}

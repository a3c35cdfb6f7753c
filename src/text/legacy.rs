//! Legacy colour-code renderer.
//!
//! Parses `&`-prefixed (or `§`-prefixed) colour and format codes into a flat
//! list of styled nodes under an empty root.

use std::sync::LazyLock;

use regex::Regex;

use super::{ClickEvent, RenderError, Renderer, Style, TextColor, TextNode};

/// Characters that introduce a code.
const MARKERS: [char; 2] = ['&', '§'];

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("URL pattern is valid"));

/// Default style applied to extracted links.
pub fn default_link_style() -> Style {
    Style {
        color: Some(TextColor::White),
        underlined: true,
        ..Style::default()
    }
}

/// Renderer for `&a`-style legacy markup.
#[derive(Debug, Clone)]
pub struct LegacyRenderer {
    /// Style for extracted links; `None` disables link extraction.
    link_style: Option<Style>,
}

impl LegacyRenderer {
    /// Create a renderer with link extraction in the default link style.
    pub fn new() -> Self {
        Self {
            link_style: Some(default_link_style()),
        }
    }

    /// Create a renderer extracting links in the given style.
    pub fn with_link_style(style: Style) -> Self {
        Self {
            link_style: Some(style),
        }
    }

    /// Create a renderer that leaves URLs as plain text.
    pub fn without_links() -> Self {
        Self { link_style: None }
    }
}

impl Default for LegacyRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for LegacyRenderer {
    /// Malformed `&#` sequences are kept as literal text.
    fn parse(&self, markup: &str) -> Result<TextNode, RenderError> {
        let children = Parser::new(markup, self.link_style.as_ref(), false).parse()?;
        Ok(TextNode {
            children,
            ..TextNode::empty()
        })
    }

    fn validate(&self, markup: &str) -> Result<(), RenderError> {
        Parser::new(markup, self.link_style.as_ref(), true)
            .parse()
            .map(|_| ())
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    link_style: Option<&'a Style>,
    /// Reject malformed hex colours instead of keeping them as text.
    strict: bool,
    style: Style,
    buffer: String,
    nodes: Vec<TextNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, link_style: Option<&'a Style>, strict: bool) -> Self {
        Self {
            input,
            pos: 0,
            link_style,
            strict,
            style: Style::default(),
            buffer: String::new(),
            nodes: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<TextNode>, RenderError> {
        while let Some(c) = self.peek_char() {
            self.advance();

            if !MARKERS.contains(&c) {
                self.buffer.push(c);
                continue;
            }

            let marker_pos = self.pos - c.len_utf8();
            let Some(code) = self.peek_char() else {
                // Trailing marker is literal text
                self.buffer.push(c);
                break;
            };

            if code == '#' {
                match self.parse_hex() {
                    Some(color) => self.set_style(Style::colored(color)),
                    None if self.strict => {
                        let digits: String = self.input[self.pos + 1..].chars().take(6).collect();
                        return Err(RenderError::MalformedHexColor {
                            position: marker_pos,
                            sequence: format!("{c}#{digits}"),
                        });
                    }
                    None => self.buffer.push(c),
                }
                continue;
            }

            if let Some(color) = TextColor::from_legacy_code(code) {
                self.advance();
                self.set_style(Style::colored(color));
                continue;
            }

            let mut style = self.style;
            match code.to_ascii_lowercase() {
                'k' => style.obfuscated = true,
                'l' => style.bold = true,
                'm' => style.strikethrough = true,
                'n' => style.underlined = true,
                'o' => style.italic = true,
                'r' => style = Style::default(),
                _ => {
                    self.buffer.push(c);
                    continue;
                }
            }
            self.advance();
            self.set_style(style);
        }

        self.flush();
        Ok(self.nodes)
    }

    /// Read `#` and six hex digits, consuming them only when they form a colour.
    fn parse_hex(&mut self) -> Option<TextColor> {
        let digits: String = self.input[self.pos + 1..].chars().take(6).collect();
        let color = super::parse_hex(&digits)?;
        self.pos += 1 + digits.len();
        Some(color)
    }

    fn set_style(&mut self, style: Style) {
        self.flush();
        self.style = style;
    }

    /// Emit buffered text as nodes, splitting out links.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);

        let Some(link_style) = self.link_style else {
            self.nodes.push(TextNode::text(text).with_style(self.style));
            return;
        };

        let mut last = 0;
        for found in URL_PATTERN.find_iter(&text) {
            if found.start() > last {
                self.nodes
                    .push(TextNode::text(&text[last..found.start()]).with_style(self.style));
            }
            self.nodes.push(
                TextNode::text(found.as_str())
                    .with_style(self.style.merge(link_style))
                    .with_click(ClickEvent::open_url(found.as_str())),
            );
            last = found.end();
        }
        if last < text.len() {
            self.nodes
                .push(TextNode::text(&text[last..]).with_style(self.style));
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }
}

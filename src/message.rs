//! Message construction.
//!
//! [`MessageBuilder`] turns a [`ChatFormat`] and a raw body into structured
//! text:
//!
//! 1. placeholders are substituted in the body, hover and click templates
//! 2. extra params (if any) are applied literally
//! 3. `{message}` in the body is replaced with the raw body
//! 4. the body is rendered, the hover and click decorations are built and
//!    applied to every node that lacks one
//!
//! The raw body is inserted after every substitution pass, so text typed by a
//! participant is never expanded.

use std::collections::HashMap;
use std::sync::Arc;

use crate::format::ChatFormat;
use crate::participant::Participant;
use crate::placeholder::{apply_params, PlaceholderRegistry, MESSAGE_TOKEN};
use crate::text::{ClickEvent, HoverEvent, RenderError, Renderer, StructuredText, TextNode};

/// Literal form of the body token.
const MESSAGE_PLACEHOLDER: &str = "{message}";

/// Templates of a format after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Expanded {
    body: String,
    hover: Option<String>,
    click: Option<ClickEvent>,
}

/// Builds structured messages from formats.
#[derive(Clone)]
pub struct MessageBuilder {
    placeholders: Arc<PlaceholderRegistry>,
    renderer: Arc<dyn Renderer>,
}

impl MessageBuilder {
    /// Create a builder.
    pub fn new(placeholders: Arc<PlaceholderRegistry>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            placeholders,
            renderer,
        }
    }

    /// Get the placeholder registry.
    pub fn placeholders(&self) -> &Arc<PlaceholderRegistry> {
        &self.placeholders
    }

    /// Get the renderer.
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Build a message.
    ///
    /// `params` replaces `{key}` tokens literally after placeholder
    /// substitution. A `message` entry is ignored; the body always comes
    /// from `raw_body`.
    pub fn build(
        &self,
        participant: &dyn Participant,
        format: &ChatFormat,
        raw_body: &str,
        params: Option<&HashMap<String, String>>,
    ) -> Result<StructuredText, RenderError> {
        let expanded = self.expand(participant, format, raw_body, params);

        let tree = self.renderer.parse(&expanded.body)?;
        let hover = match expanded.hover {
            Some(hover) => Some(HoverEvent::show_text(self.renderer.parse(&hover)?)),
            None => None,
        };
        Ok(tree.decorate(hover.as_ref(), expanded.click.as_ref()))
    }

    /// Build a message without rendering markup.
    ///
    /// The substituted body becomes a single text node carrying the same
    /// decorations. Used when [`MessageBuilder::build`] fails.
    pub fn build_plain(
        &self,
        participant: &dyn Participant,
        format: &ChatFormat,
        raw_body: &str,
        params: Option<&HashMap<String, String>>,
    ) -> StructuredText {
        let expanded = self.expand(participant, format, raw_body, params);
        let hover = expanded.hover.map(|hover| {
            let text = self
                .renderer
                .parse(&hover)
                .unwrap_or_else(|_| TextNode::text(hover));
            HoverEvent::show_text(text)
        });
        TextNode::text(expanded.body).decorate(hover.as_ref(), expanded.click.as_ref())
    }

    /// Flatten a message for logging.
    pub fn plain_text(&self, text: &StructuredText) -> String {
        self.renderer.plain_text(text)
    }

    fn expand(
        &self,
        participant: &dyn Participant,
        format: &ChatFormat,
        raw_body: &str,
        params: Option<&HashMap<String, String>>,
    ) -> Expanded {
        let params = params.map(|params| {
            let mut params = params.clone();
            params.remove(MESSAGE_TOKEN);
            params
        });
        let resolve = |template: &str| {
            let text = self.placeholders.substitute(participant, template);
            match &params {
                Some(params) => apply_params(&text, params),
                None => text,
            }
        };

        let body = resolve(format.body_template()).replace(MESSAGE_PLACEHOLDER, raw_body);
        let hover = format
            .hover_template()
            .map(&resolve)
            .filter(|hover| !hover.is_empty());
        let click = format
            .click_kind()
            .action()
            .zip(format.click_value_template())
            .map(|(action, value)| ClickEvent::new(action, resolve(value)));

        Expanded { body, hover, click }
    }
}

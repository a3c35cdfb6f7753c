//! Priority-ordered format lists, grouped by context.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::ChatFormat;
use crate::participant::Participant;
use crate::text::Renderer;
use crate::{GChatError, Result};

/// Context used for regular chat messages.
pub const CHAT_CONTEXT: &str = "chat";

/// Formats of one context, sorted by priority (descending), then id.
#[derive(Debug, Clone, Default)]
pub struct FormatSet {
    formats: Vec<Arc<ChatFormat>>,
}

impl FormatSet {
    /// Build a set, rejecting duplicate ids.
    pub fn new(formats: Vec<ChatFormat>) -> Result<Self> {
        let mut seen = HashSet::new();
        for format in &formats {
            if !seen.insert(format.id().to_string()) {
                return Err(GChatError::Config(format!(
                    "duplicate format id: {}",
                    format.id()
                )));
            }
        }

        let mut formats: Vec<Arc<ChatFormat>> = formats.into_iter().map(Arc::new).collect();
        formats.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(Self { formats })
    }

    /// First format the participant may use.
    pub fn select(&self, participant: &dyn Participant) -> Option<Arc<ChatFormat>> {
        self.formats.iter().find(|f| f.can_use(participant)).cloned()
    }

    /// Get a format by id (case-insensitive).
    pub fn get(&self, id: &str) -> Option<Arc<ChatFormat>> {
        let id = id.to_lowercase();
        self.formats.iter().find(|f| f.id() == id).cloned()
    }

    /// Formats in selection order.
    pub fn formats(&self) -> &[Arc<ChatFormat>] {
        &self.formats
    }

    /// Get the number of formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Independent format sets keyed by context name.
#[derive(Debug, Clone, Default)]
pub struct FormatContexts {
    contexts: HashMap<String, FormatSet>,
}

impl FormatContexts {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the set for a context. Names are lower-cased.
    pub fn with_context(mut self, context: &str, set: FormatSet) -> Self {
        self.contexts.insert(context.to_lowercase(), set);
        self
    }

    /// Get the set for a context.
    pub fn context(&self, context: &str) -> Option<&FormatSet> {
        self.contexts.get(&context.to_lowercase())
    }

    /// Context names, sorted.
    pub fn context_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contexts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check the body and hover markup of every format.
    pub fn validate_markup(&self, renderer: &dyn Renderer) -> Result<()> {
        for set in self.contexts.values() {
            for format in set.formats() {
                renderer.validate(format.body_template())?;
                if let Some(hover) = format.hover_template() {
                    renderer.validate(hover)?;
                }
            }
        }
        Ok(())
    }
}

/// Format registry with atomic snapshot replacement.
///
/// Readers clone the current snapshot handle; [`FormatRegistry::replace`]
/// swaps in a fully built one.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    current: RwLock<Arc<FormatContexts>>,
}

impl FormatRegistry {
    /// Create a registry holding the given formats.
    pub fn new(contexts: FormatContexts) -> Self {
        Self {
            current: RwLock::new(Arc::new(contexts)),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<FormatContexts> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace all formats at once.
    pub fn replace(&self, contexts: FormatContexts) {
        let contexts = Arc::new(contexts);
        debug!(contexts = ?contexts.context_names(), "format registry replaced");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = contexts;
    }

    /// Select the highest-priority usable format.
    ///
    /// `context` defaults to [`CHAT_CONTEXT`]. Returns None when the context
    /// is unknown or no format is usable.
    pub fn select_format(
        &self,
        participant: &dyn Participant,
        context: Option<&str>,
    ) -> Option<Arc<ChatFormat>> {
        let snapshot = self.snapshot();
        let set = snapshot.context(context.unwrap_or(CHAT_CONTEXT))?;
        set.select(participant)
    }

    /// Formats of a context in selection order.
    pub fn formats(&self, context: &str) -> Vec<Arc<ChatFormat>> {
        self.snapshot()
            .context(context)
            .map(|set| set.formats().to_vec())
            .unwrap_or_default()
    }
}

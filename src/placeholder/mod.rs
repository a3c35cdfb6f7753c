//! Placeholder substitution for gChat.
//!
//! Templates contain `{token}` placeholders. A [`PlaceholderRegistry`] holds
//! the registered [`PlaceholderProvider`]s and replaces each token with the
//! first value a provider returns.
//!
//! Providers are tried in a fixed order: higher priority first, then in
//! registration order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gchat::participant::{BasicParticipant, MemoryMetadataStore};
//! use gchat::placeholder::{PlaceholderRegistry, StandardPlaceholders};
//!
//! let registry = PlaceholderRegistry::new();
//! registry.register(Arc::new(StandardPlaceholders::new(Arc::new(MemoryMetadataStore::new()))));
//!
//! let ann = BasicParticipant::new("Ann");
//! assert_eq!(registry.substitute(&ann, "hi {username} {unknown}"), "hi Ann {unknown}");
//! ```

mod metadata;
mod standard;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::{Captures, Regex};

use crate::participant::Participant;

pub use metadata::MetadataPlaceholders;
pub use standard::{format_time, StandardPlaceholders};

/// Token replaced with the chat body. Providers are never consulted for it.
pub const MESSAGE_TOKEN: &str = "message";

/// Matches `{identifier}` where the identifier has no braces.
static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"));

/// Resolves placeholder tokens for a participant.
pub trait PlaceholderProvider: Send + Sync {
    /// Resolve a token (without braces), or None if this provider does not know it.
    fn resolve(&self, participant: &dyn Participant, token: &str) -> Option<String>;
}

/// Handle returned by [`PlaceholderRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

struct RegisteredProvider {
    id: ProviderId,
    priority: i32,
    provider: Arc<dyn PlaceholderProvider>,
}

/// Ordered set of placeholder providers.
#[derive(Default)]
pub struct PlaceholderRegistry {
    providers: RwLock<Vec<RegisteredProvider>>,
    next_id: AtomicU64,
}

impl PlaceholderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider with priority 0.
    pub fn register(&self, provider: Arc<dyn PlaceholderProvider>) -> ProviderId {
        self.register_with_priority(provider, 0)
    }

    /// Register a provider. Higher priorities are consulted first.
    pub fn register_with_priority(
        &self,
        provider: Arc<dyn PlaceholderProvider>,
        priority: i32,
    ) -> ProviderId {
        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.push(RegisteredProvider {
            id,
            priority,
            provider,
        });
        providers.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        id
    }

    /// Remove a provider.
    ///
    /// Returns true if it was registered.
    pub fn unregister(&self, id: ProviderId) -> bool {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        let before = providers.len();
        providers.retain(|p| p.id != id);
        providers.len() != before
    }

    /// Get the number of registered providers.
    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a single token through the providers.
    pub fn resolve(&self, participant: &dyn Participant, token: &str) -> Option<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers
            .iter()
            .find_map(|p| p.provider.resolve(participant, token))
    }

    /// Replace every resolvable `{token}` in `text`.
    ///
    /// Unresolved tokens and `{message}` are left as they are. Replacement
    /// values are inserted verbatim and never scanned again.
    pub fn substitute(&self, participant: &dyn Participant, text: &str) -> String {
        if text.is_empty() || self.is_empty() {
            return text.to_string();
        }

        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        PLACEHOLDER_PATTERN
            .replace_all(text, |caps: &Captures<'_>| {
                let token = &caps[1];
                if token == MESSAGE_TOKEN {
                    return caps[0].to_string();
                }
                resolved
                    .entry(token.to_string())
                    .or_insert_with(|| self.resolve(participant, token))
                    .clone()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Replace `{key}` tokens with literal values from `params`.
///
/// Single pass: inserted values are not scanned for further tokens.
pub fn apply_params(text: &str, params: &HashMap<String, String>) -> String {
    if text.is_empty() || params.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            params
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

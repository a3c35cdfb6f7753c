//! Placeholders read straight from the metadata store.

use std::sync::Arc;

use super::PlaceholderProvider;
use crate::participant::{MetadataStore, Participant};

/// Token prefix handled by [`MetadataPlaceholders`].
const META_PREFIX: &str = "meta_";

/// Resolves `{meta_<key>}` to the participant's metadata value.
///
/// Missing keys resolve to an empty string so templates do not leak the raw
/// token.
pub struct MetadataPlaceholders {
    metadata: Arc<dyn MetadataStore>,
}

impl MetadataPlaceholders {
    /// Create the provider backed by a metadata store.
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }
}

impl PlaceholderProvider for MetadataPlaceholders {
    fn resolve(&self, participant: &dyn Participant, token: &str) -> Option<String> {
        let key = token.strip_prefix(META_PREFIX)?;
        if key.is_empty() {
            return None;
        }
        Some(self.metadata.get(participant.id(), key).unwrap_or_default())
    }
}

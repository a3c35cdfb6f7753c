//! Built-in placeholders.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::PlaceholderProvider;
use crate::participant::{display_name, MetadataStore, Participant, PRONOUNS, TIMEZONE};

/// Prefix of the dynamic permission-check placeholder.
const HAS_PERM_PREFIX: &str = "has_perm_";

/// Time format used by `{now}`.
const TIME_FORMAT: &str = "%H:%M";

/// Placeholders describing the participant.
///
/// | Token | Value |
/// |---|---|
/// | `username` | login name |
/// | `name`, `display_name`, `display_username` | nickname, else username |
/// | `uuid` | participant id |
/// | `server_name` | current server, `unknown` if none |
/// | `pronouns` | pronouns metadata |
/// | `pronouns_suffix` | ` (pronouns)` or empty |
/// | `timezone` | timezone metadata |
/// | `now` | `HH:MM` in the participant's timezone |
/// | `ping` | latency in ms, `?` if unknown |
/// | `has_perm_<node>` | `true` / `false` |
pub struct StandardPlaceholders {
    metadata: Arc<dyn MetadataStore>,
}

impl StandardPlaceholders {
    /// Create the provider backed by a metadata store.
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    fn meta(&self, participant: &dyn Participant, key: &str) -> String {
        self.metadata
            .get(participant.id(), key)
            .unwrap_or_default()
    }
}

impl PlaceholderProvider for StandardPlaceholders {
    fn resolve(&self, participant: &dyn Participant, token: &str) -> Option<String> {
        if let Some(permission) = token.strip_prefix(HAS_PERM_PREFIX) {
            if !permission.is_empty() {
                return Some(participant.has_permission(permission).to_string());
            }
        }

        let value = match token.to_lowercase().as_str() {
            "username" => participant.username().to_string(),
            "name" | "display_name" | "display_username" => {
                display_name(participant, self.metadata.as_ref())
            }
            "uuid" => participant.id().to_string(),
            "server_name" => participant
                .current_server()
                .unwrap_or_else(|| "unknown".to_string()),
            "pronouns" => self.meta(participant, PRONOUNS),
            "pronouns_suffix" => {
                let pronouns = self.meta(participant, PRONOUNS);
                if pronouns.trim().is_empty() {
                    String::new()
                } else {
                    format!(" ({pronouns})")
                }
            }
            "timezone" => self.meta(participant, TIMEZONE),
            "now" => {
                let timezone = self.metadata.get(participant.id(), TIMEZONE);
                format_time(Utc::now(), timezone.as_deref())
            }
            "ping" => participant
                .ping()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string()),
            _ => return None,
        };
        Some(value)
    }
}

/// Format an instant as `HH:MM` in the named timezone.
///
/// Unknown or missing timezones fall back to UTC.
pub fn format_time(now: DateTime<Utc>, timezone: Option<&str>) -> String {
    match timezone.and_then(|name| name.trim().parse::<Tz>().ok()) {
        Some(tz) => now.with_timezone(&tz).format(TIME_FORMAT).to_string(),
        None => now.format(TIME_FORMAT).to_string(),
    }
}

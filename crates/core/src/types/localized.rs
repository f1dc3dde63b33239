//! Language-tagged text as sent by the backend (`{"en": "...", "fr": "..."}`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Locale used when the requested language has no entry.
pub const DEFAULT_LOCALE: &str = "en";

/// A mapping from language tag to display string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// Create from `(language, text)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Text for `locale`, falling back to [`DEFAULT_LOCALE`] and then to any entry.
    #[must_use]
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0
            .get(locale)
            .or_else(|| self.0.get(DEFAULT_LOCALE))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    /// Text for `locale`, or an empty string when there is no entry at all.
    #[must_use]
    pub fn get_or_empty(&self, locale: &str) -> &str {
        self.get(locale).unwrap_or_default()
    }

    /// Whether no language has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

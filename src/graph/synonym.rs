//! Locale-tagged topic names and display-name resolution

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Locale used when the requested one has no synonym
pub const DEFAULT_LOCALE: &str = "en";

/// Name shown for a topic that has no synonyms at all
pub const MISSING_NAME: &str = "[missing name]";

/// A single `(locale, name)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Synonym {
    pub locale: String,
    pub name: String,
}

impl Synonym {
    pub fn new(locale: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            name: name.into(),
        }
    }

    /// English synonym
    pub fn en(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_LOCALE, name)
    }
}

/// Insertion-ordered synonym list for a topic
///
/// Display-name lookups build a locale → position table on first use and
/// reuse it for every later call on the same value, whatever locale is asked
/// for. Any mutation through this type discards the table.
///
/// Serializes as a plain JSON array of synonyms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Synonym>", into = "Vec<Synonym>")]
pub struct Synonyms {
    entries: Vec<Synonym>,
    by_locale: OnceLock<HashMap<String, usize>>,
}

impl Synonyms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Synonym> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a synonym unless the exact same pair is already present
    ///
    /// Returns `false` when the pair was a duplicate.
    pub fn push(&mut self, synonym: Synonym) -> bool {
        if self.entries.contains(&synonym) {
            return false;
        }
        self.entries.push(synonym);
        self.by_locale = OnceLock::new();
        true
    }

    /// Remove every synonym with this exact pair
    pub fn remove(&mut self, synonym: &Synonym) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s != synonym);
        self.by_locale = OnceLock::new();
        self.entries.len() != before
    }

    /// Whether any synonym, in any locale, has this name (case-insensitive)
    pub fn contains_name(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.entries.iter().any(|s| s.name.to_lowercase() == wanted)
    }

    /// Character length of the shortest name starting with `prefix`
    ///
    /// Case-insensitive over full Unicode lowercase. An empty prefix matches
    /// every name.
    pub fn shortest_with_prefix(&self, prefix: &str) -> Option<usize> {
        let prefix = prefix.to_lowercase();
        self.entries
            .iter()
            .filter(|s| s.name.to_lowercase().starts_with(&prefix))
            .map(|s| s.name.chars().count())
            .min()
    }

    /// Pick the display name for `locale`
    ///
    /// Resolution order: first synonym tagged `locale`, then the first English
    /// synonym, then the first synonym of any locale. An empty list yields
    /// [`MISSING_NAME`] with `found == false`.
    pub fn display_name(&self, locale: &str) -> (&str, bool) {
        let index = self.locale_index();
        let position = index
            .get(locale)
            .or_else(|| index.get(DEFAULT_LOCALE))
            .copied()
            .or(if self.entries.is_empty() { None } else { Some(0) });

        match position {
            Some(i) => (self.entries[i].name.as_str(), true),
            None => (MISSING_NAME, false),
        }
    }

    fn locale_index(&self) -> &HashMap<String, usize> {
        self.by_locale.get_or_init(|| {
            let mut index = HashMap::new();
            for (i, synonym) in self.entries.iter().enumerate() {
                // First synonym per locale wins
                index.entry(synonym.locale.clone()).or_insert(i);
            }
            index
        })
    }
}

impl PartialEq for Synonyms {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Synonyms {}

impl From<Vec<Synonym>> for Synonyms {
    fn from(entries: Vec<Synonym>) -> Self {
        let mut synonyms = Synonyms::new();
        for synonym in entries {
            synonyms.push(synonym);
        }
        synonyms
    }
}

impl From<Synonyms> for Vec<Synonym> {
    fn from(synonyms: Synonyms) -> Self {
        synonyms.entries
    }
}

impl FromIterator<Synonym> for Synonyms {
    fn from_iter<I: IntoIterator<Item = Synonym>>(iter: I) -> Self {
        Synonyms::from(iter.into_iter().collect::<Vec<_>>())
    }
}

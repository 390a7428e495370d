//! Free-text matching for topics and links

use crate::graph::{Link, Topic};

/// Case-insensitive matcher over a query's free-text tokens
///
/// Every token must match for an item to match. No tokens match everything.
#[derive(Debug, Clone, Default)]
pub struct TextMatcher {
    tokens: Vec<String>,
}

impl TextMatcher {
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| t.as_ref().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Each token is a substring of some synonym, in any locale
    pub fn matches_topic(&self, topic: &Topic) -> bool {
        if self.is_empty() {
            return true;
        }
        let names: Vec<String> = topic.synonyms.iter().map(|s| s.name.to_lowercase()).collect();
        self.tokens
            .iter()
            .all(|token| names.iter().any(|name| name.contains(token.as_str())))
    }

    /// Each token prefixes a title word or matches inside the URL
    ///
    /// `*` in a token matches any run of characters in the URL.
    pub fn matches_link(&self, link: &Link) -> bool {
        if self.is_empty() {
            return true;
        }
        let title = link.title.to_lowercase();
        let words: Vec<&str> = title_words(&title).collect();
        let url = link.url.to_lowercase();
        self.tokens.iter().all(|token| {
            words.iter().any(|word| word.starts_with(token.as_str())) || wildcard_contains(&url, token)
        })
    }
}

/// Split a title into words on anything that is not alphanumeric
fn title_words(title: &str) -> impl Iterator<Item = &str> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Whether `pattern` occurs in `haystack`, with `*` matching any run
pub fn wildcard_contains(haystack: &str, pattern: &str) -> bool {
    let mut rest = haystack;
    for part in pattern.split('*').filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    true
}

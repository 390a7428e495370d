//! Types produced and consumed by the query system

use crate::graph::{Link, Topic, TopicId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A parsed search string
///
/// Built per request and thrown away afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// The input exactly as given
    pub raw_input: String,
    /// Free-text tokens in input order
    pub free_text_tokens: Vec<String>,
    /// Topics named by `in:` tokens
    pub explicit_topic_scopes: BTreeSet<TopicId>,
}

impl QuerySpec {
    /// Parse a raw search string; never fails
    pub fn parse(raw: &str) -> Self {
        super::parse::parse(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.free_text_tokens.is_empty() && self.explicit_topic_scopes.is_empty()
    }
}

/// Ranked, budget-limited search output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub topics: Vec<Topic>,
    pub links: Vec<Link>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.topics.len() + self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.links.is_empty()
    }
}

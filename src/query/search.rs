//! Scoped search over the closure index

use super::matcher::TextMatcher;
use super::types::{QuerySpec, SearchResults};
use crate::graph::{RepositoryId, TopicId, DEFAULT_LOCALE, DEFAULT_MAX_BUDGET};
use crate::storage::{GraphTxn, StorageResult};
use std::collections::BTreeSet;

/// Search for topics and links under a set of starting topics
///
/// Candidates must be reachable from every starting topic: the base topic
/// and each `in:` scope of the query. Topics are served first; links get
/// whatever budget topics leave over.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub spec: QuerySpec,
    /// Topic the search starts from
    pub base: TopicId,
    /// Maximum number of topics plus links returned
    pub budget: i64,
    /// Locale of the display names used for ranking
    pub locale: String,
}

impl SearchQuery {
    pub fn new(spec: QuerySpec, base: TopicId) -> Self {
        Self {
            spec,
            base,
            budget: DEFAULT_MAX_BUDGET,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }

    pub fn with_budget(mut self, budget: i64) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// `{base} ∪ explicit scopes`
    pub fn starting_topics(&self) -> BTreeSet<TopicId> {
        let mut starting = self.spec.explicit_topic_scopes.clone();
        starting.insert(self.base.clone());
        starting
    }

    /// Execute the search inside an open unit of work
    pub fn execute(&self, txn: &dyn GraphTxn, repo: &RepositoryId) -> StorageResult<SearchResults> {
        if self.budget <= 0 {
            return Ok(SearchResults::default());
        }
        let mut remaining = usize::try_from(self.budget).unwrap_or(usize::MAX);

        let starting: Vec<TopicId> = self.starting_topics().into_iter().collect();
        let matcher = TextMatcher::new(&self.spec.free_text_tokens);

        let mut topics: Vec<_> = txn
            .topics_within(repo, &starting)?
            .into_iter()
            .filter(|t| !starting.contains(&t.id))
            .filter(|t| matcher.matches_topic(t))
            .map(|t| (t.display_name(&self.locale), t))
            .collect();
        topics.sort_by(|(a_name, a), (b_name, b)| {
            a_name
                .chars()
                .count()
                .cmp(&b_name.chars().count())
                .then_with(|| a_name.cmp(b_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        topics.truncate(remaining);
        remaining -= topics.len();

        let mut results = SearchResults {
            topics: topics.into_iter().map(|(_, t)| t).collect(),
            links: Vec::new(),
        };
        if remaining == 0 {
            return Ok(results);
        }

        let mut links: Vec<_> = txn
            .links_within(repo, &starting)?
            .into_iter()
            .filter(|l| matcher.matches_link(l))
            .collect();
        links.sort_by(|a, b| {
            a.title
                .chars()
                .count()
                .cmp(&b.title.chars().count())
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        links.truncate(remaining);
        results.links = links;
        Ok(results)
    }
}

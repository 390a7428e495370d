//! Engine configuration

use super::synonym::DEFAULT_LOCALE;
use serde::{Deserialize, Serialize};

/// Largest result budget a single search may request
pub const DEFAULT_MAX_BUDGET: i64 = 100;

/// Name given to the root topic of new repositories
pub const DEFAULT_ROOT_TOPIC_NAME: &str = "Everything";

/// Tunables for [`TopicGraph`](super::TopicGraph)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Locale used for display names when the caller does not ask for one
    pub default_locale: String,
    /// Synonym given to the root topic of a new repository
    pub root_topic_name: String,
    /// Requested search budgets are clamped to this value
    pub max_budget: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            root_topic_name: DEFAULT_ROOT_TOPIC_NAME.to_string(),
            max_budget: DEFAULT_MAX_BUDGET,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn with_root_topic_name(mut self, name: impl Into<String>) -> Self {
        self.root_topic_name = name.into();
        self
    }

    pub fn with_max_budget(mut self, max_budget: i64) -> Self {
        self.max_budget = max_budget;
        self
    }

    /// Clamp a requested budget to `[.., max_budget]`
    ///
    /// Zero and negative budgets pass through unchanged; search treats them
    /// as "return nothing".
    pub fn clamp_budget(&self, requested: i64) -> i64 {
        requested.min(self.max_budget)
    }
}

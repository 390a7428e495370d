//! Topic representation in the knowledge graph

use super::repository::RepositoryId;
use super::synonym::{Synonym, Synonyms};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a topic
///
/// Serializes as a plain string. Generated IDs are UUIDs, but any string of
/// ASCII alphanumerics, `-` and `_` is accepted so that IDs can round-trip
/// through `in:/topics/<id>` query tokens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Create a new random TopicId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TopicId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TopicId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a topic's time range is shown in front of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRangePrefix {
    #[default]
    None,
    /// `2020 Name`
    StartYear,
    /// `2020-05 Name`
    StartYearMonth,
}

/// A point in time a topic is about (an event, an era)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub starts: DateTime<Utc>,
    #[serde(default)]
    pub prefix: TimeRangePrefix,
}

impl TimeRange {
    pub fn new(starts: DateTime<Utc>, prefix: TimeRangePrefix) -> Self {
        Self { starts, prefix }
    }

    /// The prefix text, if this range is configured to show one
    pub fn prefix(&self) -> Option<String> {
        match self.prefix {
            TimeRangePrefix::None => None,
            TimeRangePrefix::StartYear => Some(self.starts.format("%Y").to_string()),
            TimeRangePrefix::StartYearMonth => Some(self.starts.format("%Y-%m").to_string()),
        }
    }
}

/// A named node in the topic graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Owning repository; edges never cross repositories
    pub repository_id: RepositoryId,
    pub synonyms: Synonyms,
    pub description: Option<String>,
    pub time_range: Option<TimeRange>,
    /// The single topic every other topic in the repository descends from
    #[serde(default)]
    pub root: bool,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    /// Create a new topic with a single synonym
    pub fn new(repository_id: RepositoryId, synonym: Synonym) -> Self {
        let mut synonyms = Synonyms::new();
        synonyms.push(synonym);
        Self {
            id: TopicId::new(),
            repository_id,
            synonyms,
            description: None,
            time_range: None,
            root: false,
            created_at: Utc::now(),
        }
    }

    /// Create the root topic of a repository
    pub fn root(repository_id: RepositoryId, name: impl Into<String>) -> Self {
        let mut topic = Self::new(repository_id, Synonym::en(name));
        topic.root = true;
        topic
    }

    pub fn with_id(mut self, id: TopicId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_synonym(mut self, synonym: Synonym) -> Self {
        self.synonyms.push(synonym);
        self
    }

    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    /// Resolve the synonym shown for `locale`; see [`Synonyms::display_name`]
    pub fn resolve_display_name(&self, locale: &str) -> (&str, bool) {
        self.synonyms.display_name(locale)
    }

    /// Display name with the time-range prefix applied
    pub fn display_name(&self, locale: &str) -> String {
        let (name, _) = self.resolve_display_name(locale);
        match self.time_range.as_ref().and_then(TimeRange::prefix) {
            Some(prefix) => format!("{} {}", prefix, name),
            None => name.to_string(),
        }
    }
}

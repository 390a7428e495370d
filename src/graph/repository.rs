//! Repository: the collection scope a topic graph lives in

use super::topic::TopicId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a repository
///
/// Serializes as a plain string (UUID or semantic ID like "repo:wiki")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Create a new random RepositoryId (UUID-based)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a RepositoryId from a string (semantic ID)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepositoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RepositoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A self-contained topic graph with exactly one root topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    /// Human-readable name
    pub name: String,
    /// Owner/creator of the repository
    pub owner: Option<String>,
    /// Every topic and link in the repository descends from this topic
    pub root_topic_id: TopicId,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(name: impl Into<String>, root_topic_id: TopicId) -> Self {
        Self {
            id: RepositoryId::new(),
            name: name.into(),
            owner: None,
            root_topic_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: RepositoryId) -> Self {
        self.id = id;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

//! Bookmarked links and the URL canonicalization seam

use super::repository::RepositoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
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

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LinkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LinkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A bookmarked URL filed under one or more topics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub repository_id: RepositoryId,
    pub title: String,
    /// Canonical form of the URL the user submitted
    pub url: String,
    /// Content-derived dedup key, unique per repository
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(repository_id: RepositoryId, canonical: CanonicalUrl, title: impl Into<String>) -> Self {
        Self {
            id: LinkId::new(),
            repository_id,
            title: title.into(),
            url: canonical.url,
            fingerprint: canonical.fingerprint,
            created_at: Utc::now(),
        }
    }
}

/// Output of URL canonicalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    pub url: String,
    pub fingerprint: String,
}

/// Turns user-submitted URLs into a canonical URL plus fingerprint
///
/// Links are deduplicated by fingerprint within a repository, so two inputs
/// that canonicalize to the same URL must produce the same fingerprint.
pub trait UrlCanonicalizer: Send + Sync {
    /// Returns `None` when the input is not a usable URL
    fn canonicalize(&self, raw: &str) -> Option<CanonicalUrl>;
}

/// Minimal canonicalizer: lowercases scheme and host, drops the fragment,
/// and fingerprints the result with a UUIDv5 in the URL namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCanonicalizer;

impl UrlCanonicalizer for BasicCanonicalizer {
    fn canonicalize(&self, raw: &str) -> Option<CanonicalUrl> {
        let trimmed = raw.trim();
        let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
        let (scheme, rest) = without_fragment.split_once("://")?;
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            return None;
        }

        let (host, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        if host.is_empty() {
            return None;
        }
        let path = if path == "/" { "" } else { path };

        let url = format!("{}://{}{}", scheme.to_ascii_lowercase(), host.to_ascii_lowercase(), path);
        let fingerprint = Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes())
            .simple()
            .to_string();

        Some(CanonicalUrl { url, fingerprint })
    }
}

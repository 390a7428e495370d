//! Storage trait definitions

use crate::graph::{
    Link, LinkEdge, LinkId, Repository, RepositoryId, Topic, TopicEdge, TopicId,
};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Connection lock poisoned")]
    LockPoisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for looking topics up by name
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    /// Some synonym equals this name, ignoring case
    pub name: Option<String>,
    /// Some synonym starts with this prefix, ignoring case
    pub name_prefix: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl TopicFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Trait for graph storage backends
///
/// A store hands out units of work. Everything done through one
/// [`GraphTxn`] becomes visible to other callers atomically on
/// [`GraphTxn::commit`]; dropping a transaction without committing discards
/// its writes. Implementations must be thread-safe (Send + Sync).
pub trait GraphStore: Send + Sync {
    /// Open a read-only unit of work
    fn read(&self) -> StorageResult<Box<dyn GraphTxn + '_>>;

    /// Open a unit of work that may write
    ///
    /// Write units are serialized against each other by the store.
    fn write(&self) -> StorageResult<Box<dyn GraphTxn + '_>>;
}

/// Operations available inside a unit of work
///
/// Every operation is scoped to a repository. Rows of other repositories
/// are never visible or touched.
pub trait GraphTxn {
    // === Repository Operations ===

    fn save_repository(&mut self, repository: &Repository) -> StorageResult<()>;

    fn load_repository(&self, id: &RepositoryId) -> StorageResult<Option<Repository>>;

    fn list_repositories(&self) -> StorageResult<Vec<Repository>>;

    // === Topic Operations ===

    /// Save a topic (insert or update)
    fn save_topic(&mut self, topic: &Topic) -> StorageResult<()>;

    fn load_topic(&self, repo: &RepositoryId, id: &TopicId) -> StorageResult<Option<Topic>>;

    /// Load several topics; missing IDs are skipped
    fn load_topics(&self, repo: &RepositoryId, ids: &[TopicId]) -> StorageResult<Vec<Topic>>;

    fn topic_ids(&self, repo: &RepositoryId) -> StorageResult<Vec<TopicId>>;

    fn count_topics(&self, repo: &RepositoryId) -> StorageResult<usize>;

    /// Find topics whose synonyms match the filter
    fn find_topics(&self, repo: &RepositoryId, filter: &TopicFilter) -> StorageResult<Vec<Topic>>;

    /// Delete a topic together with every edge touching it
    ///
    /// Closure rows are left for the caller to rebuild.
    fn delete_topic(&mut self, repo: &RepositoryId, id: &TopicId) -> StorageResult<bool>;

    // === Link Operations ===

    /// Save a link (insert or update)
    fn save_link(&mut self, link: &Link) -> StorageResult<()>;

    fn load_link(&self, repo: &RepositoryId, id: &LinkId) -> StorageResult<Option<Link>>;

    fn load_link_by_fingerprint(
        &self,
        repo: &RepositoryId,
        fingerprint: &str,
    ) -> StorageResult<Option<Link>>;

    fn load_links(&self, repo: &RepositoryId, ids: &[LinkId]) -> StorageResult<Vec<Link>>;

    /// Delete a link together with its edges and closure rows
    fn delete_link(&mut self, repo: &RepositoryId, id: &LinkId) -> StorageResult<bool>;

    // === Edge Operations ===

    /// Insert a topic → topic edge; `false` if it already existed
    fn insert_topic_edge(&mut self, repo: &RepositoryId, edge: &TopicEdge) -> StorageResult<bool>;

    /// Delete a topic → topic edge; `false` if it did not exist
    fn delete_topic_edge(&mut self, repo: &RepositoryId, edge: &TopicEdge) -> StorageResult<bool>;

    /// Insert a topic → link edge; `false` if it already existed
    fn insert_link_edge(&mut self, repo: &RepositoryId, edge: &LinkEdge) -> StorageResult<bool>;

    /// Delete a topic → link edge; `false` if it did not exist
    fn delete_link_edge(&mut self, repo: &RepositoryId, edge: &LinkEdge) -> StorageResult<bool>;

    fn parent_topic_ids(&self, repo: &RepositoryId, child: &TopicId) -> StorageResult<Vec<TopicId>>;

    fn child_topic_ids(&self, repo: &RepositoryId, parent: &TopicId) -> StorageResult<Vec<TopicId>>;

    fn link_parent_ids(&self, repo: &RepositoryId, link: &LinkId) -> StorageResult<Vec<TopicId>>;

    fn child_link_ids(&self, repo: &RepositoryId, parent: &TopicId) -> StorageResult<Vec<LinkId>>;

    /// Every topic → topic edge in the repository
    fn topic_edges(&self, repo: &RepositoryId) -> StorageResult<Vec<TopicEdge>>;

    /// Every topic → link edge in the repository
    fn link_edges(&self, repo: &RepositoryId) -> StorageResult<Vec<LinkEdge>>;

    // === Closure Operations ===

    /// Whether `(ancestor, descendant)` is in the topic closure
    fn closure_contains(
        &self,
        repo: &RepositoryId,
        ancestor: &TopicId,
        descendant: &TopicId,
    ) -> StorageResult<bool>;

    /// Topics with a closure entry `(x, topic)`, including `topic` itself
    fn closure_ancestors(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<TopicId>>;

    /// Topics with a closure entry `(topic, x)`, including `topic` itself
    fn closure_descendants(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<TopicId>>;

    /// Links with a link-closure entry `(topic, link)`
    fn closure_links(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<LinkId>>;

    /// Insert topic-closure rows, ignoring rows that already exist
    fn insert_topic_closure(
        &mut self,
        repo: &RepositoryId,
        pairs: &[(TopicId, TopicId)],
    ) -> StorageResult<()>;

    /// Insert link-closure rows, ignoring rows that already exist
    fn insert_link_closure(
        &mut self,
        repo: &RepositoryId,
        pairs: &[(TopicId, LinkId)],
    ) -> StorageResult<()>;

    /// Drop every link-closure row for one link
    fn clear_link_closure(&mut self, repo: &RepositoryId, link: &LinkId) -> StorageResult<()>;

    /// Drop every closure row (topic and link) for the repository
    fn clear_closure(&mut self, repo: &RepositoryId) -> StorageResult<()>;

    // === Scoped Reads ===

    /// Topics that are closure descendants of every topic in `scopes`
    fn topics_within(&self, repo: &RepositoryId, scopes: &[TopicId]) -> StorageResult<Vec<Topic>>;

    /// Links that are link-closure descendants of every topic in `scopes`
    fn links_within(&self, repo: &RepositoryId, scopes: &[TopicId]) -> StorageResult<Vec<Link>>;

    /// Make this unit of work's writes durable and visible
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}

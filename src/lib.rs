//! topicgraph: a topic/link graph engine
//!
//! Links are filed under topics, and topics under other topics, forming a
//! directed acyclic graph per repository rather than a tree.
//!
//! # Core Concepts
//!
//! - **Topics**: named nodes with locale-tagged synonyms and any number of parents
//! - **Links**: bookmarked URLs, deduplicated by fingerprint, filed under topics
//! - **Closure index**: materialized ancestor/descendant pairs, so "everything
//!   under X" is one indexed lookup
//! - **Search**: free text plus `in:/topics/<id>` scopes, intersected over the
//!   closure and cut to a result budget
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use topicgraph::{OpenStore, QuerySpec, SqliteStore, TopicGraph};
//!
//! let graph = TopicGraph::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
//! let repo = graph.create_repository("notes", None).unwrap();
//! let farming = graph.upsert_topic(&repo.id, "Agriculture", &[], None).unwrap().topic;
//! graph.upsert_topic(&repo.id, "Crop rotation", &[farming.id.clone()], None).unwrap();
//!
//! let results = graph
//!     .search(&repo.id, &QuerySpec::parse("crop"), &repo.root_topic_id, 10)
//!     .unwrap();
//! assert_eq!(results.topics[0].display_name("en"), "Crop rotation");
//! ```

mod graph;
pub mod index;
pub mod query;
pub mod storage;

pub use graph::{
    Alert, AlertKind, BasicCanonicalizer, CanonicalUrl, CycleGuard, EngineConfig, GraphError,
    GraphResult, Link, LinkEdge, LinkId, Mutation, ParentUpdate, Repository, RepositoryId,
    Synonym, Synonyms, TimeRange, TimeRangePrefix, Topic, TopicEdge, TopicGraph, TopicId,
    UpsertLinkResult, UpsertTopicResult, UrlCanonicalizer, DEFAULT_LOCALE, DEFAULT_MAX_BUDGET,
    DEFAULT_ROOT_TOPIC_NAME, MISSING_NAME,
};
pub use index::IndexStats;
pub use query::{parse, QuerySpec, SearchQuery, SearchResults};
pub use storage::{GraphStore, GraphTxn, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Core graph data structures and the engine that maintains them

mod alert;
mod config;
mod edge;
mod engine;
mod guard;
mod link;
mod mutation;
mod repository;
mod synonym;
mod topic;


pub use alert::{Alert, AlertKind};
pub use config::{EngineConfig, DEFAULT_MAX_BUDGET, DEFAULT_ROOT_TOPIC_NAME};
pub use edge::{LinkEdge, TopicEdge};
pub use engine::{GraphError, GraphResult, TopicGraph};
pub use guard::CycleGuard;
pub use link::{BasicCanonicalizer, CanonicalUrl, Link, LinkId, UrlCanonicalizer};
pub use mutation::{Mutation, ParentUpdate, UpsertLinkResult, UpsertTopicResult};
pub use repository::{Repository, RepositoryId};
pub use synonym::{Synonym, Synonyms, DEFAULT_LOCALE, MISSING_NAME};
pub use topic::{TimeRange, TimeRangePrefix, Topic, TopicId};

//! Storage backends for topicgraph
//!
//! The engine talks to storage through the `GraphStore` trait, which hands
//! out transactional units of work. `SqliteStore` is the persistent
//! implementation and also serves in-memory stores for tests.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{GraphStore, GraphTxn, OpenStore, StorageError, StorageResult, TopicFilter};

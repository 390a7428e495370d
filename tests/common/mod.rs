//! Common test utilities for topicgraph integration tests
//!
//! Fixtures for building graphs, a brute-force reachability reference, and
//! store wrappers that count or fail calls.

#![allow(dead_code)]

pub mod fixtures;
pub mod reference;
pub mod stores;

pub use fixtures::{farm_graph, new_graph, FarmGraph};
pub use reference::{reachable, reachable_links};
pub use stores::{CountingStore, FailingStore};

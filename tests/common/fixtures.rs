//! Graph fixtures

use std::sync::Arc;
use topicgraph::{GraphStore, OpenStore, Repository, SqliteStore, TopicGraph, TopicId};

/// A fresh in-memory graph with one repository
pub fn new_graph() -> (TopicGraph, Repository) {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    graph_on(Arc::new(store))
}

/// A graph over the given store with one repository
pub fn graph_on(store: Arc<dyn GraphStore>) -> (TopicGraph, Repository) {
    let graph = TopicGraph::new(store);
    let repository = graph
        .create_repository("test", Some("tester"))
        .expect("create repository");
    (graph, repository)
}

/// Everything → Agriculture → Crop rotation, plus a diamond
///
/// ```text
/// Everything ─┬─ Agriculture ── Crop rotation
///             ├─ A ─┬─ X
///             │     └─ Y
///             └─ B ─── X
/// ```
pub struct FarmGraph {
    pub graph: TopicGraph,
    pub repo: Repository,
    pub agriculture: TopicId,
    pub crop_rotation: TopicId,
    pub a: TopicId,
    pub b: TopicId,
    pub x: TopicId,
    pub y: TopicId,
}

pub fn farm_graph() -> FarmGraph {
    let (graph, repo) = new_graph();
    let upsert = |name: &str, parents: &[TopicId]| {
        graph
            .upsert_topic(&repo.id, name, parents, None)
            .expect("upsert topic")
            .topic
            .id
    };

    let agriculture = upsert("Agriculture", &[]);
    let crop_rotation = upsert("Crop rotation", &[agriculture.clone()]);
    let a = upsert("A", &[]);
    let b = upsert("B", &[]);
    let x = upsert("X", &[a.clone(), b.clone()]);
    let y = upsert("Y", &[a.clone()]);

    FarmGraph {
        graph,
        repo,
        agriculture,
        crop_rotation,
        a,
        b,
        x,
        y,
    }
}

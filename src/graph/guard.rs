//! Cycle guard for topic → topic edges

use super::repository::RepositoryId;
use super::topic::TopicId;
use crate::index::Adjacency;
use crate::storage::{GraphTxn, StorageResult};

/// Decides whether a candidate edge `child ← parent` would close a cycle
///
/// Runs against the same unit of work the edge will be written in. While
/// indexing is deferred (inside a bulk mutation) the closure tables lag the
/// edge tables, so the guard walks the current edges instead.
pub struct CycleGuard<'t> {
    txn: &'t dyn GraphTxn,
    repo: &'t RepositoryId,
    index_pending: bool,
}

impl<'t> CycleGuard<'t> {
    pub fn new(txn: &'t dyn GraphTxn, repo: &'t RepositoryId) -> Self {
        Self {
            txn,
            repo,
            index_pending: false,
        }
    }

    pub fn with_pending_index(mut self, pending: bool) -> Self {
        self.index_pending = pending;
        self
    }

    /// Whether `candidate_descendant` is reachable from `candidate_ancestor`
    ///
    /// Reflexive: a topic is a descendant of itself.
    pub fn is_descendant_of(
        &self,
        candidate_descendant: &TopicId,
        candidate_ancestor: &TopicId,
    ) -> StorageResult<bool> {
        if !self.index_pending {
            return self
                .txn
                .closure_contains(self.repo, candidate_ancestor, candidate_descendant);
        }

        let bound = self.txn.count_topics(self.repo)?;
        let edges = self.txn.topic_edges(self.repo)?;
        let adjacency = Adjacency::from_edges(&edges);
        Ok(adjacency.path_exists(candidate_ancestor, candidate_descendant, bound))
    }

    /// Whether adding `parent → child` would make some topic its own ancestor
    pub fn would_create_cycle(&self, child: &TopicId, parent: &TopicId) -> StorageResult<bool> {
        if child == parent {
            return Ok(true);
        }
        self.is_descendant_of(parent, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Repository, Synonym, Topic, TopicEdge};
    use crate::index;
    use crate::storage::{GraphStore, OpenStore, SqliteStore};

    /// root → a → b, indexed
    fn chain() -> (SqliteStore, RepositoryId) {
        let store = SqliteStore::open_in_memory().unwrap();
        let repo = RepositoryId::from("repo:guard");
        let mut txn = store.write().unwrap();
        txn.save_repository(&Repository::new("guard", TopicId::from("root")).with_id(repo.clone()))
            .unwrap();
        for name in ["root", "a", "b"] {
            let topic = Topic::new(repo.clone(), Synonym::en(name)).with_id(TopicId::from(name));
            txn.save_topic(&topic).unwrap();
        }
        for (p, c) in [("root", "a"), ("a", "b")] {
            txn.insert_topic_edge(&repo, &TopicEdge::new(TopicId::from(p), TopicId::from(c)))
                .unwrap();
        }
        index::rebuild(&mut *txn, &repo).unwrap();
        txn.commit().unwrap();
        (store, repo)
    }

    #[test]
    fn self_parent_is_rejected() {
        let (store, repo) = chain();
        let txn = store.read().unwrap();
        let guard = CycleGuard::new(&*txn, &repo);
        let a = TopicId::from("a");
        assert!(guard.would_create_cycle(&a, &a).unwrap());
    }

    #[test]
    fn back_edge_is_rejected_forward_edge_allowed() {
        let (store, repo) = chain();
        let txn = store.read().unwrap();
        let guard = CycleGuard::new(&*txn, &repo);
        let root = TopicId::from("root");
        let b = TopicId::from("b");

        // root under b
        assert!(guard.would_create_cycle(&root, &b).unwrap());
        // b directly under root as well
        assert!(!guard.would_create_cycle(&b, &root).unwrap());
    }

    #[test]
    fn pending_index_walks_edges() {
        let (store, repo) = chain();
        let mut txn = store.write().unwrap();
        let c = Topic::new(repo.clone(), Synonym::en("c")).with_id(TopicId::from("c"));
        txn.save_topic(&c).unwrap();
        // Written but not indexed
        txn.insert_topic_edge(&repo, &TopicEdge::new(TopicId::from("b"), c.id.clone()))
            .unwrap();

        let indexed = CycleGuard::new(&*txn, &repo);
        assert!(!indexed.is_descendant_of(&c.id, &TopicId::from("a")).unwrap());

        let walking = CycleGuard::new(&*txn, &repo).with_pending_index(true);
        assert!(walking.is_descendant_of(&c.id, &TopicId::from("a")).unwrap());
        assert!(walking.would_create_cycle(&TopicId::from("a"), &c.id).unwrap());
    }
}

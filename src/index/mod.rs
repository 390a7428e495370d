//! Closure index maintenance
//!
//! The closure tables are derived from the edge tables. Adds are folded in
//! incrementally; removing a topic edge recomputes the repository, since
//! incremental deletion from a transitive closure is where stale rows come
//! from. Every function here runs inside the caller's unit of work.

mod closure;

pub use closure::{Adjacency, Closure};

use crate::graph::{LinkEdge, LinkId, RepositoryId, TopicEdge, TopicId};
use crate::storage::{GraphTxn, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Row counts written by a full rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub topics: usize,
    pub topic_rows: usize,
    pub link_rows: usize,
}

/// Topics reachable from `topic`, including `topic` itself
pub fn descendants_of(
    txn: &dyn GraphTxn,
    repo: &RepositoryId,
    topic: &TopicId,
) -> StorageResult<BTreeSet<TopicId>> {
    Ok(txn.closure_descendants(repo, topic)?.into_iter().collect())
}

/// Links filed anywhere under `topic`
pub fn descendant_links_of(
    txn: &dyn GraphTxn,
    repo: &RepositoryId,
    topic: &TopicId,
) -> StorageResult<BTreeSet<LinkId>> {
    Ok(txn.closure_links(repo, topic)?.into_iter().collect())
}

/// A new topic reaches itself
pub fn on_topic_inserted(
    txn: &mut dyn GraphTxn,
    repo: &RepositoryId,
    topic: &TopicId,
) -> StorageResult<()> {
    txn.insert_topic_closure(repo, &[(topic.clone(), topic.clone())])
}

/// Fold a new `parent → child` edge into the closure
///
/// Everything that reaches `parent` now reaches everything `child` reaches,
/// links included.
pub fn on_topic_edge_added(
    txn: &mut dyn GraphTxn,
    repo: &RepositoryId,
    edge: &TopicEdge,
) -> StorageResult<()> {
    let ancestors = txn.closure_ancestors(repo, &edge.parent)?;
    let descendants = txn.closure_descendants(repo, &edge.child)?;
    let links = txn.closure_links(repo, &edge.child)?;

    let mut topic_rows = Vec::with_capacity(ancestors.len() * descendants.len());
    let mut link_rows = Vec::with_capacity(ancestors.len() * links.len());
    for ancestor in &ancestors {
        for descendant in &descendants {
            topic_rows.push((ancestor.clone(), descendant.clone()));
        }
        for link in &links {
            link_rows.push((ancestor.clone(), link.clone()));
        }
    }

    tracing::debug!(
        parent = %edge.parent,
        child = %edge.child,
        topic_rows = topic_rows.len(),
        link_rows = link_rows.len(),
        "closure: edge added"
    );

    txn.insert_topic_closure(repo, &topic_rows)?;
    txn.insert_link_closure(repo, &link_rows)
}

/// Recompute after a topic edge disappeared
pub fn on_topic_edge_removed(
    txn: &mut dyn GraphTxn,
    repo: &RepositoryId,
    edge: &TopicEdge,
) -> StorageResult<()> {
    tracing::debug!(parent = %edge.parent, child = %edge.child, "closure: edge removed");
    rebuild(txn, repo).map(|_| ())
}

/// Fold a new `parent → link` edge into the link closure
pub fn on_link_edge_added(
    txn: &mut dyn GraphTxn,
    repo: &RepositoryId,
    edge: &LinkEdge,
) -> StorageResult<()> {
    let rows: Vec<_> = txn
        .closure_ancestors(repo, &edge.parent)?
        .into_iter()
        .map(|ancestor| (ancestor, edge.link.clone()))
        .collect();
    tracing::debug!(parent = %edge.parent, link = %edge.link, rows = rows.len(), "closure: link edge added");
    txn.insert_link_closure(repo, &rows)
}

/// Recompute one link's rows from the parents it still has
pub fn on_link_edge_removed(
    txn: &mut dyn GraphTxn,
    repo: &RepositoryId,
    edge: &LinkEdge,
) -> StorageResult<()> {
    txn.clear_link_closure(repo, &edge.link)?;

    let mut rows = BTreeSet::new();
    for parent in txn.link_parent_ids(repo, &edge.link)? {
        for ancestor in txn.closure_ancestors(repo, &parent)? {
            rows.insert((ancestor, edge.link.clone()));
        }
    }
    let rows: Vec<_> = rows.into_iter().collect();
    tracing::debug!(parent = %edge.parent, link = %edge.link, rows = rows.len(), "closure: link edge removed");
    txn.insert_link_closure(repo, &rows)
}

/// Drop and recompute the whole closure of a repository
pub fn rebuild(txn: &mut dyn GraphTxn, repo: &RepositoryId) -> StorageResult<IndexStats> {
    let topics = txn.topic_ids(repo)?;
    let topic_edges = txn.topic_edges(repo)?;
    let link_edges = txn.link_edges(repo)?;
    let closure = Closure::compute(&topics, &topic_edges, &link_edges);

    let topic_rows: Vec<_> = closure.topics.into_iter().collect();
    let link_rows: Vec<_> = closure.links.into_iter().collect();

    txn.clear_closure(repo)?;
    txn.insert_topic_closure(repo, &topic_rows)?;
    txn.insert_link_closure(repo, &link_rows)?;

    let stats = IndexStats {
        topics: topics.len(),
        topic_rows: topic_rows.len(),
        link_rows: link_rows.len(),
    };
    tracing::debug!(
        repository = %repo,
        topics = stats.topics,
        topic_rows = stats.topic_rows,
        link_rows = stats.link_rows,
        "closure rebuilt"
    );
    Ok(stats)
}

//! In-memory reachability over topic edges
//!
//! Used to compute a repository's full closure on rebuild and as the
//! traversal fallback of the cycle guard while indexing is deferred.

use crate::graph::{LinkEdge, LinkId, TopicEdge, TopicId};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Parent → children adjacency for one repository
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    children: HashMap<TopicId, Vec<TopicId>>,
}

impl Adjacency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'e>(edges: impl IntoIterator<Item = &'e TopicEdge>) -> Self {
        let mut adjacency = Self::new();
        for edge in edges {
            adjacency.add_edge(edge.parent.clone(), edge.child.clone());
        }
        adjacency
    }

    pub fn add_edge(&mut self, parent: TopicId, child: TopicId) {
        let children = self.children.entry(parent).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    pub fn children(&self, parent: &TopicId) -> &[TopicId] {
        self.children.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every topic reachable from `start` by zero or more edges
    pub fn reachable_from(&self, start: &TopicId) -> BTreeSet<TopicId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.clone());
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        seen
    }

    /// Whether `to` is reachable from `from`, following at most `bound` edges
    ///
    /// In an acyclic graph of N topics no shortest path is longer than N - 1
    /// edges, so a bound of N never cuts off a real path. The visited set
    /// keeps the walk finite even if the stored edges are already cyclic.
    pub fn path_exists(&self, from: &TopicId, to: &TopicId, bound: usize) -> bool {
        if from == to {
            return true;
        }

        let mut seen: HashSet<&TopicId> = HashSet::new();
        let mut frontier = vec![from];
        seen.insert(from);

        for _ in 0..bound {
            let mut next = Vec::new();
            for current in frontier {
                for child in self.children(current) {
                    if child == to {
                        return true;
                    }
                    if seen.insert(child) {
                        next.push(child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        false
    }
}

/// A repository's complete closure, computed from scratch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    /// `(ancestor, descendant)`, reflexive
    pub topics: BTreeSet<(TopicId, TopicId)>,
    /// `(ancestor, link)`
    pub links: BTreeSet<(TopicId, LinkId)>,
}

impl Closure {
    /// Compute the closure of `topics` over the given edges
    ///
    /// The result depends only on the edge sets, never on their order.
    pub fn compute(topics: &[TopicId], topic_edges: &[TopicEdge], link_edges: &[LinkEdge]) -> Self {
        let adjacency = Adjacency::from_edges(topic_edges);

        let mut links_by_parent: HashMap<&TopicId, Vec<&LinkId>> = HashMap::new();
        for edge in link_edges {
            links_by_parent.entry(&edge.parent).or_default().push(&edge.link);
        }

        let mut closure = Self::default();
        for ancestor in topics {
            for descendant in adjacency.reachable_from(ancestor) {
                if let Some(links) = links_by_parent.get(&descendant) {
                    for link in links {
                        closure.links.insert((ancestor.clone(), (*link).clone()));
                    }
                }
                closure.topics.insert((ancestor.clone(), descendant));
            }
        }
        closure
    }

    pub fn descendants_of(&self, topic: &TopicId) -> BTreeSet<TopicId> {
        self.topics
            .iter()
            .filter(|(a, _)| a == topic)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

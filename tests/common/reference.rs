//! Brute-force reachability used as a reference for the closure index

use std::collections::{BTreeSet, HashMap, VecDeque};
use topicgraph::{LinkEdge, LinkId, TopicEdge, TopicId};

/// Topics reachable from `from` over `edges`, including `from`
pub fn reachable(edges: &[TopicEdge], from: &TopicId) -> BTreeSet<TopicId> {
    let mut outgoing: HashMap<&TopicId, Vec<&TopicId>> = HashMap::new();
    for edge in edges {
        outgoing.entry(&edge.parent).or_default().push(&edge.child);
    }

    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    visited.insert(from.clone());
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        if let Some(neighbors) = outgoing.get(current) {
            for neighbor in neighbors {
                if visited.insert((*neighbor).clone()) {
                    queue.push_back(neighbor);
                }
            }
        }
    }
    visited
}

/// Links filed under any topic reachable from `from`
pub fn reachable_links(edges: &[TopicEdge], link_edges: &[LinkEdge], from: &TopicId) -> BTreeSet<LinkId> {
    let topics = reachable(edges, from);
    link_edges
        .iter()
        .filter(|e| topics.contains(&e.parent))
        .map(|e| e.link.clone())
        .collect()
}

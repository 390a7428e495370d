//! Parent → child edges between topics and links

use super::link::LinkId;
use super::topic::TopicId;
use serde::{Deserialize, Serialize};

/// A topic filed under a parent topic
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicEdge {
    pub parent: TopicId,
    pub child: TopicId,
}

impl TopicEdge {
    pub fn new(parent: TopicId, child: TopicId) -> Self {
        Self { parent, child }
    }
}

/// A link filed under a parent topic
///
/// Links are always leaves: nothing is ever filed under a link.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkEdge {
    pub parent: TopicId,
    pub link: LinkId,
}

impl LinkEdge {
    pub fn new(parent: TopicId, link: LinkId) -> Self {
        Self { parent, link }
    }
}

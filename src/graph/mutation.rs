//! Unit of work for graph mutations
//!
//! A [`Mutation`] wraps one write transaction. Each edge write and its
//! closure update happen through it, and nothing is visible to other callers
//! until [`Mutation::finish`] commits. Dropping a mutation without finishing
//! rolls everything back.

use super::alert::Alert;
use super::config::EngineConfig;
use super::edge::{LinkEdge, TopicEdge};
use super::engine::{GraphError, GraphResult};
use super::guard::CycleGuard;
use super::link::{Link, LinkId, UrlCanonicalizer};
use super::repository::{Repository, RepositoryId};
use super::synonym::Synonym;
use super::topic::{TimeRange, Topic, TopicId};
use crate::index::{self, IndexStats};
use crate::storage::{GraphTxn, TopicFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Result of [`Mutation::upsert_topic`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertTopicResult {
    pub topic: Topic,
    /// `false` when an existing topic matched the name
    pub created: bool,
    pub alerts: Vec<Alert>,
}

/// Result of [`Mutation::upsert_link`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertLinkResult {
    pub link: Link,
    /// `false` when a link with the same fingerprint already existed
    pub created: bool,
    pub alerts: Vec<Alert>,
}

/// Result of replacing or extending a parent set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentUpdate {
    /// Parents after the update, sorted
    pub parents: Vec<TopicId>,
    pub alerts: Vec<Alert>,
}

/// One open unit of work against a single repository
pub struct Mutation<'a> {
    txn: Box<dyn GraphTxn + 'a>,
    repository: Repository,
    config: &'a EngineConfig,
    canonicalizer: &'a dyn UrlCanonicalizer,
    /// Edge writes skip incremental indexing; the closure is rebuilt in `finish`
    deferred: bool,
}

impl<'a> Mutation<'a> {
    pub(crate) fn new(
        txn: Box<dyn GraphTxn + 'a>,
        repository: Repository,
        config: &'a EngineConfig,
        canonicalizer: &'a dyn UrlCanonicalizer,
    ) -> Self {
        Self {
            txn,
            repository,
            config,
            canonicalizer,
            deferred: false,
        }
    }

    pub(crate) fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    fn repo_id(&self) -> &RepositoryId {
        &self.repository.id
    }

    fn root_id(&self) -> &TopicId {
        &self.repository.root_topic_id
    }

    /// Read access to the open transaction
    pub fn txn(&self) -> &dyn GraphTxn {
        &*self.txn
    }

    /// Rebuild the closure if indexing was deferred, then commit
    pub fn finish(mut self) -> GraphResult<()> {
        if self.deferred {
            let repo = self.repository.id.clone();
            index::rebuild(&mut *self.txn, &repo)?;
        }
        self.txn.commit()?;
        Ok(())
    }

    // === Lookups ===

    pub fn topic(&self, id: &TopicId) -> GraphResult<Topic> {
        self.txn
            .load_topic(self.repo_id(), id)?
            .ok_or_else(|| GraphError::TopicNotFound(id.clone()))
    }

    pub fn link(&self, id: &LinkId) -> GraphResult<Link> {
        self.txn
            .load_link(self.repo_id(), id)?
            .ok_or_else(|| GraphError::LinkNotFound(id.clone()))
    }

    fn display_name(&self, topic: &Topic) -> String {
        topic.display_name(&self.config.default_locale)
    }

    fn cycle_error(&self, child: &Topic, parent: &Topic) -> GraphError {
        GraphError::Cycle {
            child: child.id.clone(),
            parent: parent.id.clone(),
            child_name: self.display_name(child),
            parent_name: self.display_name(parent),
        }
    }

    // === Topic → topic edges ===

    /// Add `parent → child`; `Ok(false)` if the edge already existed
    pub fn add_parent_topic(&mut self, child: &TopicId, parent: &TopicId) -> GraphResult<bool> {
        let child_topic = self.topic(child)?;
        let parent_topic = self.topic(parent)?;

        let guard = CycleGuard::new(&*self.txn, &self.repository.id).with_pending_index(self.deferred);
        if guard.would_create_cycle(child, parent)? {
            // Names come from the freshly loaded topics
            return Err(self.cycle_error(&child_topic, &parent_topic));
        }

        let edge = TopicEdge::new(parent.clone(), child.clone());
        let repo = self.repository.id.clone();
        let inserted = self.txn.insert_topic_edge(&repo, &edge)?;
        if inserted && !self.deferred {
            index::on_topic_edge_added(&mut *self.txn, &repo, &edge)?;
        }
        tracing::debug!(parent = %parent, child = %child, inserted, "add parent topic");
        Ok(inserted)
    }

    /// Remove `parent → child`
    ///
    /// Fails with `EdgeNotFound` if there is no such edge and with
    /// `Constraint` if it is the child's last parent.
    pub fn remove_parent_topic(&mut self, child: &TopicId, parent: &TopicId) -> GraphResult<()> {
        let repo = self.repository.id.clone();
        let parents = self.txn.parent_topic_ids(&repo, child)?;
        if !parents.contains(parent) {
            return Err(GraphError::EdgeNotFound {
                parent: parent.clone(),
                child: child.to_string(),
            });
        }
        if parents.len() == 1 {
            return Err(GraphError::Constraint(format!(
                "topic {} must keep at least one parent topic",
                child
            )));
        }

        let edge = TopicEdge::new(parent.clone(), child.clone());
        self.txn.delete_topic_edge(&repo, &edge)?;
        if !self.deferred {
            index::on_topic_edge_removed(&mut *self.txn, &repo, &edge)?;
        }
        tracing::debug!(parent = %parent, child = %child, "remove parent topic");
        Ok(())
    }

    /// Attach each parent that exists and does not close a cycle
    ///
    /// Rejected parents come back as warning alerts.
    fn attach_parents(&mut self, child: &Topic, parents: &[TopicId]) -> GraphResult<(Vec<TopicId>, Vec<Alert>)> {
        let mut accepted = Vec::new();
        let mut alerts = Vec::new();

        for parent in parents.iter().collect::<BTreeSet<_>>() {
            let parent_topic = match self.txn.load_topic(self.repo_id(), parent)? {
                Some(topic) => topic,
                None => {
                    alerts.push(Alert::warn(format!("Parent topic {} was not found", parent)));
                    continue;
                }
            };

            match self.add_parent_topic(&child.id, parent) {
                Ok(_) => accepted.push(parent.clone()),
                Err(GraphError::Cycle { .. }) => {
                    let parent_name = self.display_name(&parent_topic);
                    let child_name = self.display_name(child);
                    tracing::warn!(parent = %parent, child = %child.id, "parent topic rejected: cycle");
                    alerts.push(Alert::warn(format!(
                        "\"{}\" is a descendant of \"{}\" and cannot be added as a parent topic",
                        parent_name, child_name
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        Ok((accepted, alerts))
    }

    /// Replace the parent set of a topic
    ///
    /// Parents that are missing or would form a cycle are skipped with a
    /// warning. If nothing is left the topic goes under the root.
    pub fn update_parent_topics(&mut self, topic: &TopicId, parents: &[TopicId]) -> GraphResult<ParentUpdate> {
        let child = self.topic(topic)?;
        if child.root {
            if parents.is_empty() {
                return Ok(ParentUpdate::default());
            }
            return Err(GraphError::Constraint("the root topic cannot have parent topics".into()));
        }

        let (mut accepted, mut alerts) = self.attach_parents(&child, parents)?;
        if accepted.is_empty() {
            let root = self.root_id().clone();
            self.add_parent_topic(topic, &root)?;
            accepted.push(root);
        }

        // Additions first: dropping a topic's parents never changes its
        // descendants, so the guard's answers above still hold.
        let repo = self.repository.id.clone();
        let keep: BTreeSet<_> = accepted.iter().cloned().collect();
        let mut removed = false;
        for current in self.txn.parent_topic_ids(&repo, topic)? {
            if !keep.contains(&current) {
                self.txn
                    .delete_topic_edge(&repo, &TopicEdge::new(current, topic.clone()))?;
                removed = true;
            }
        }
        if removed && !self.deferred {
            index::rebuild(&mut *self.txn, &repo)?;
        }

        if alerts.is_empty() {
            alerts.push(Alert::success(format!(
                "Parent topics of \"{}\" updated",
                self.display_name(&child)
            )));
        }
        Ok(ParentUpdate {
            parents: self.txn.parent_topic_ids(&repo, topic)?,
            alerts,
        })
    }

    // === Topics ===

    /// Create a topic, or return the existing one with the same name
    ///
    /// Name matching is case-insensitive across every synonym and locale. An
    /// existing match gets the supplied parents added and a warning alert.
    pub fn upsert_topic(
        &mut self,
        name: &str,
        parents: &[TopicId],
        description: Option<&str>,
    ) -> GraphResult<UpsertTopicResult> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GraphError::Constraint("topic name cannot be empty".into()));
        }

        let existing = self
            .txn
            .find_topics(self.repo_id(), &TopicFilter::named(name).with_limit(1))?
            .into_iter()
            .next();

        if let Some(topic) = existing {
            let mut alerts = vec![Alert::warn(format!(
                "A topic with the name \"{}\" already exists",
                name
            ))];
            if !topic.root {
                let (_, rejected) = self.attach_parents(&topic, parents)?;
                alerts.extend(rejected);
            }
            return Ok(UpsertTopicResult {
                topic,
                created: false,
                alerts,
            });
        }

        let mut topic = Topic::new(
            self.repository.id.clone(),
            Synonym::new(self.config.default_locale.clone(), name),
        );
        if let Some(description) = description {
            topic = topic.with_description(description);
        }
        let repo = self.repository.id.clone();
        self.txn.save_topic(&topic)?;
        if !self.deferred {
            index::on_topic_inserted(&mut *self.txn, &repo, &topic.id)?;
        }

        let (accepted, mut alerts) = self.attach_parents(&topic, parents)?;
        if accepted.is_empty() {
            let root = self.root_id().clone();
            self.add_parent_topic(&topic.id, &root)?;
        }

        alerts.insert(0, Alert::success(format!("Created topic \"{}\"", name)));
        tracing::debug!(topic = %topic.id, name, "topic created");
        Ok(UpsertTopicResult {
            topic,
            created: true,
            alerts,
        })
    }

    /// Set description and time range
    pub fn update_topic(
        &mut self,
        id: &TopicId,
        description: Option<String>,
        time_range: Option<TimeRange>,
    ) -> GraphResult<Topic> {
        let mut topic = self.topic(id)?;
        topic.description = description;
        topic.time_range = time_range;
        self.txn.save_topic(&topic)?;
        Ok(topic)
    }

    /// Replace the synonym list, keeping its order and dropping repeats
    pub fn update_synonyms(&mut self, id: &TopicId, synonyms: Vec<Synonym>) -> GraphResult<Topic> {
        let mut topic = self.topic(id)?;
        let synonyms: Vec<Synonym> = synonyms
            .into_iter()
            .filter(|s| !s.name.trim().is_empty())
            .collect();
        if synonyms.is_empty() {
            return Err(GraphError::Constraint(format!(
                "topic {} must keep at least one synonym",
                id
            )));
        }
        topic.synonyms = synonyms.into();
        self.txn.save_topic(&topic)?;
        Ok(topic)
    }

    /// Delete a topic and every edge touching it
    ///
    /// Child topics and links left without a parent are moved under the root.
    pub fn delete_topic(&mut self, id: &TopicId) -> GraphResult<()> {
        let topic = self.topic(id)?;
        if topic.root || id == self.root_id() {
            return Err(GraphError::Constraint("the root topic cannot be deleted".into()));
        }

        let repo = self.repository.id.clone();
        let root = self.root_id().clone();
        let children = self.txn.child_topic_ids(&repo, id)?;
        let links = self.txn.child_link_ids(&repo, id)?;

        self.txn.delete_topic(&repo, id)?;

        for child in children {
            if self.txn.parent_topic_ids(&repo, &child)?.is_empty() {
                self.txn
                    .insert_topic_edge(&repo, &TopicEdge::new(root.clone(), child))?;
            }
        }
        for link in links {
            if self.txn.link_parent_ids(&repo, &link)?.is_empty() {
                self.txn
                    .insert_link_edge(&repo, &LinkEdge::new(root.clone(), link))?;
            }
        }

        if !self.deferred {
            index::rebuild(&mut *self.txn, &repo)?;
        }
        tracing::debug!(topic = %id, "topic deleted");
        Ok(())
    }

    // === Links ===

    /// Add `parent → link`; `Ok(false)` if the edge already existed
    pub fn add_link_parent_topic(&mut self, link: &LinkId, parent: &TopicId) -> GraphResult<bool> {
        self.link(link)?;
        self.topic(parent)?;

        let repo = self.repository.id.clone();
        let edge = LinkEdge::new(parent.clone(), link.clone());
        let inserted = self.txn.insert_link_edge(&repo, &edge)?;
        if inserted && !self.deferred {
            index::on_link_edge_added(&mut *self.txn, &repo, &edge)?;
        }
        tracing::debug!(parent = %parent, link = %link, inserted, "add link parent topic");
        Ok(inserted)
    }

    /// Remove `parent → link`; same failure rules as [`Self::remove_parent_topic`]
    pub fn remove_link_parent_topic(&mut self, link: &LinkId, parent: &TopicId) -> GraphResult<()> {
        let repo = self.repository.id.clone();
        let parents = self.txn.link_parent_ids(&repo, link)?;
        if !parents.contains(parent) {
            return Err(GraphError::EdgeNotFound {
                parent: parent.clone(),
                child: link.to_string(),
            });
        }
        if parents.len() == 1 {
            return Err(GraphError::Constraint(format!(
                "link {} must keep at least one parent topic",
                link
            )));
        }

        let edge = LinkEdge::new(parent.clone(), link.clone());
        self.txn.delete_link_edge(&repo, &edge)?;
        if !self.deferred {
            index::on_link_edge_removed(&mut *self.txn, &repo, &edge)?;
        }
        tracing::debug!(parent = %parent, link = %link, "remove link parent topic");
        Ok(())
    }

    fn attach_link_parents(&mut self, link: &LinkId, parents: &[TopicId]) -> GraphResult<(Vec<TopicId>, Vec<Alert>)> {
        let mut accepted = Vec::new();
        let mut alerts = Vec::new();
        for parent in parents.iter().collect::<BTreeSet<_>>() {
            match self.add_link_parent_topic(link, parent) {
                Ok(_) => accepted.push(parent.clone()),
                Err(GraphError::TopicNotFound(_)) => {
                    alerts.push(Alert::warn(format!("Parent topic {} was not found", parent)));
                }
                Err(e) => return Err(e),
            }
        }
        Ok((accepted, alerts))
    }

    /// Replace the parent set of a link; empty falls back to the root
    pub fn update_link_parent_topics(&mut self, link: &LinkId, parents: &[TopicId]) -> GraphResult<ParentUpdate> {
        self.link(link)?;
        let (mut accepted, mut alerts) = self.attach_link_parents(link, parents)?;
        if accepted.is_empty() {
            let root = self.root_id().clone();
            self.add_link_parent_topic(link, &root)?;
            accepted.push(root);
        }

        let repo = self.repository.id.clone();
        let keep: BTreeSet<_> = accepted.into_iter().collect();
        for current in self.txn.link_parent_ids(&repo, link)? {
            if !keep.contains(&current) {
                let edge = LinkEdge::new(current, link.clone());
                self.txn.delete_link_edge(&repo, &edge)?;
                if !self.deferred {
                    index::on_link_edge_removed(&mut *self.txn, &repo, &edge)?;
                }
            }
        }

        if alerts.is_empty() {
            alerts.push(Alert::success("Parent topics of link updated"));
        }
        Ok(ParentUpdate {
            parents: self.txn.link_parent_ids(&repo, link)?,
            alerts,
        })
    }

    /// Create or update a link by the fingerprint of its canonical URL
    ///
    /// A new link without usable parents goes under the root. For an
    /// existing link the title is replaced when one is given and the parents
    /// are added to the ones it already has.
    pub fn upsert_link(
        &mut self,
        url: &str,
        title: Option<&str>,
        parents: &[TopicId],
    ) -> GraphResult<UpsertLinkResult> {
        let canonical = self
            .canonicalizer
            .canonicalize(url)
            .ok_or_else(|| GraphError::InvalidUrl(url.to_string()))?;
        let repo = self.repository.id.clone();

        if let Some(mut link) = self.txn.load_link_by_fingerprint(&repo, &canonical.fingerprint)? {
            if let Some(title) = title {
                link.title = title.to_string();
                self.txn.save_link(&link)?;
            }
            let (_, mut alerts) = self.attach_link_parents(&link.id, parents)?;
            alerts.insert(0, Alert::success(format!("Updated link {}", link.url)));
            return Ok(UpsertLinkResult {
                link,
                created: false,
                alerts,
            });
        }

        let title = title.map(str::to_string).unwrap_or_else(|| canonical.url.clone());
        let link = Link::new(repo.clone(), canonical, title);
        self.txn.save_link(&link)?;

        let (accepted, mut alerts) = self.attach_link_parents(&link.id, parents)?;
        if accepted.is_empty() {
            let root = self.root_id().clone();
            self.add_link_parent_topic(&link.id, &root)?;
        }
        alerts.insert(0, Alert::success(format!("Added link {}", link.url)));
        tracing::debug!(link = %link.id, url = %link.url, "link created");
        Ok(UpsertLinkResult {
            link,
            created: true,
            alerts,
        })
    }

    pub fn delete_link(&mut self, id: &LinkId) -> GraphResult<()> {
        let repo = self.repository.id.clone();
        if !self.txn.delete_link(&repo, id)? {
            return Err(GraphError::LinkNotFound(id.clone()));
        }
        tracing::debug!(link = %id, "link deleted");
        Ok(())
    }

    // === Index ===

    pub fn rebuild_index(&mut self) -> GraphResult<IndexStats> {
        let repo = self.repository.id.clone();
        Ok(index::rebuild(&mut *self.txn, &repo)?)
    }
}

//! TopicGraph: the main entry point for the topic/link graph

use super::config::EngineConfig;
use super::link::{BasicCanonicalizer, Link, LinkId, UrlCanonicalizer};
use super::mutation::{Mutation, ParentUpdate, UpsertLinkResult, UpsertTopicResult};
use super::repository::{Repository, RepositoryId};
use super::synonym::Synonym;
use super::topic::{TimeRange, Topic, TopicId};
use crate::index::{self, IndexStats};
use crate::query::{QuerySpec, SearchQuery, SearchResults};
use crate::storage::{GraphStore, StorageError, TopicFilter};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in graph operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("\"{parent_name}\" is a descendant of \"{child_name}\" and cannot be its parent topic")]
    Cycle {
        child: TopicId,
        parent: TopicId,
        child_name: String,
        parent_name: String,
    },

    #[error("Repository not found: {0}")]
    RepositoryNotFound(RepositoryId),

    #[error("Topic not found: {0}")]
    TopicNotFound(TopicId),

    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    #[error("Edge not found: {parent} -> {child}")]
    EdgeNotFound { parent: TopicId, child: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error(transparent)]
    Store(#[from] StorageError),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::RepositoryNotFound(_)
                | GraphError::TopicNotFound(_)
                | GraphError::LinkNotFound(_)
                | GraphError::EdgeNotFound { .. }
        )
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// The topic graph engine
///
/// Every mutation runs as one unit of work on the store: the cycle check,
/// the edge write and the closure update commit together or not at all.
/// Reads each open their own short read transaction.
pub struct TopicGraph {
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
    canonicalizer: Arc<dyn UrlCanonicalizer>,
    /// Repositories seen so far; they are never deleted
    repositories: DashMap<RepositoryId, Repository>,
}

impl TopicGraph {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            canonicalizer: Arc::new(BasicCanonicalizer),
            repositories: DashMap::new(),
        }
    }

    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn UrlCanonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Repositories ===

    /// Create a repository together with its root topic
    pub fn create_repository(&self, name: &str, owner: Option<&str>) -> GraphResult<Repository> {
        let mut repository = Repository::new(name, TopicId::new());
        if let Some(owner) = owner {
            repository = repository.with_owner(owner);
        }
        let root = Topic::root(repository.id.clone(), self.config.root_topic_name.clone())
            .with_id(repository.root_topic_id.clone());

        let mut txn = self.store.write()?;
        txn.save_repository(&repository)?;
        txn.save_topic(&root)?;
        index::on_topic_inserted(&mut *txn, &repository.id, &root.id)?;
        txn.commit()?;

        tracing::info!(repository = %repository.id, name, "repository created");
        self.repositories
            .insert(repository.id.clone(), repository.clone());
        Ok(repository)
    }

    pub fn repository(&self, id: &RepositoryId) -> GraphResult<Repository> {
        if let Some(cached) = self.repositories.get(id) {
            return Ok(cached.clone());
        }
        let repository = self
            .store
            .read()?
            .load_repository(id)?
            .ok_or_else(|| GraphError::RepositoryNotFound(id.clone()))?;
        self.repositories.insert(id.clone(), repository.clone());
        Ok(repository)
    }

    pub fn list_repositories(&self) -> GraphResult<Vec<Repository>> {
        Ok(self.store.read()?.list_repositories()?)
    }

    // === Units of work ===

    fn run<T>(
        &self,
        repo: &RepositoryId,
        deferred: bool,
        f: impl FnOnce(&mut Mutation<'_>) -> GraphResult<T>,
    ) -> GraphResult<T> {
        // Load before taking the write lock; the store does not nest
        let repository = self.repository(repo)?;
        let txn = self.store.write()?;
        let mut mutation = Mutation::new(txn, repository, &self.config, self.canonicalizer.as_ref());
        if deferred {
            mutation = mutation.deferred();
        }
        let value = f(&mut mutation)?;
        mutation.finish()?;
        Ok(value)
    }

    /// Run several mutations as one unit of work
    ///
    /// Incremental indexing is switched off inside `f`; the cycle guard
    /// walks the edge tables instead and the closure is rebuilt once before
    /// commit. An error from `f` rolls everything back.
    ///
    /// `f` holds the store's only connection for its whole run. Reads inside
    /// it go through [`Mutation::topic`], [`Mutation::link`] or
    /// [`Mutation::txn`]; calling back into this `TopicGraph` from `f`
    /// blocks on the connection lock and never returns.
    pub fn bulk<T>(
        &self,
        repo: &RepositoryId,
        f: impl FnOnce(&mut Mutation<'_>) -> GraphResult<T>,
    ) -> GraphResult<T> {
        self.run(repo, true, f)
    }

    // === Mutations ===

    pub fn add_parent_topic(&self, repo: &RepositoryId, child: &TopicId, parent: &TopicId) -> GraphResult<bool> {
        self.run(repo, false, |m| m.add_parent_topic(child, parent))
    }

    pub fn remove_parent_topic(&self, repo: &RepositoryId, child: &TopicId, parent: &TopicId) -> GraphResult<()> {
        self.run(repo, false, |m| m.remove_parent_topic(child, parent))
    }

    pub fn add_link_parent_topic(&self, repo: &RepositoryId, link: &LinkId, parent: &TopicId) -> GraphResult<bool> {
        self.run(repo, false, |m| m.add_link_parent_topic(link, parent))
    }

    pub fn remove_link_parent_topic(&self, repo: &RepositoryId, link: &LinkId, parent: &TopicId) -> GraphResult<()> {
        self.run(repo, false, |m| m.remove_link_parent_topic(link, parent))
    }

    pub fn delete_topic(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<()> {
        self.run(repo, false, |m| m.delete_topic(topic))
    }

    pub fn upsert_topic(
        &self,
        repo: &RepositoryId,
        name: &str,
        parents: &[TopicId],
        description: Option<&str>,
    ) -> GraphResult<UpsertTopicResult> {
        self.run(repo, false, |m| m.upsert_topic(name, parents, description))
    }

    pub fn update_parent_topics(&self, repo: &RepositoryId, topic: &TopicId, parents: &[TopicId]) -> GraphResult<ParentUpdate> {
        self.run(repo, false, |m| m.update_parent_topics(topic, parents))
    }

    pub fn update_topic(
        &self,
        repo: &RepositoryId,
        topic: &TopicId,
        description: Option<String>,
        time_range: Option<TimeRange>,
    ) -> GraphResult<Topic> {
        self.run(repo, false, |m| m.update_topic(topic, description, time_range))
    }

    pub fn update_synonyms(&self, repo: &RepositoryId, topic: &TopicId, synonyms: Vec<Synonym>) -> GraphResult<Topic> {
        self.run(repo, false, |m| m.update_synonyms(topic, synonyms))
    }

    pub fn upsert_link(
        &self,
        repo: &RepositoryId,
        url: &str,
        title: Option<&str>,
        parents: &[TopicId],
    ) -> GraphResult<UpsertLinkResult> {
        self.run(repo, false, |m| m.upsert_link(url, title, parents))
    }

    pub fn update_link_parent_topics(&self, repo: &RepositoryId, link: &LinkId, parents: &[TopicId]) -> GraphResult<ParentUpdate> {
        self.run(repo, false, |m| m.update_link_parent_topics(link, parents))
    }

    pub fn delete_link(&self, repo: &RepositoryId, link: &LinkId) -> GraphResult<()> {
        self.run(repo, false, |m| m.delete_link(link))
    }

    /// Drop and recompute the repository's closure tables
    pub fn rebuild_index(&self, repo: &RepositoryId) -> GraphResult<IndexStats> {
        let stats = self.run(repo, false, |m| m.rebuild_index())?;
        tracing::info!(
            repository = %repo,
            topics = stats.topics,
            topic_rows = stats.topic_rows,
            link_rows = stats.link_rows,
            "index rebuilt"
        );
        Ok(stats)
    }

    // === Reads ===

    pub fn topic(&self, repo: &RepositoryId, id: &TopicId) -> GraphResult<Topic> {
        self.store
            .read()?
            .load_topic(repo, id)?
            .ok_or_else(|| GraphError::TopicNotFound(id.clone()))
    }

    pub fn link(&self, repo: &RepositoryId, id: &LinkId) -> GraphResult<Link> {
        self.store
            .read()?
            .load_link(repo, id)?
            .ok_or_else(|| GraphError::LinkNotFound(id.clone()))
    }

    pub fn parent_topics(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<Vec<Topic>> {
        let txn = self.store.read()?;
        let ids = txn.parent_topic_ids(repo, topic)?;
        Ok(self.sorted(txn.load_topics(repo, &ids)?))
    }

    pub fn child_topics(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<Vec<Topic>> {
        let txn = self.store.read()?;
        let ids = txn.child_topic_ids(repo, topic)?;
        Ok(self.sorted(txn.load_topics(repo, &ids)?))
    }

    pub fn child_links(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<Vec<Link>> {
        let txn = self.store.read()?;
        let ids = txn.child_link_ids(repo, topic)?;
        let mut links = txn.load_links(repo, &ids)?;
        links.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    /// The topic with a synonym equal to `name`, ignoring case
    pub fn topic_named(&self, repo: &RepositoryId, name: &str) -> GraphResult<Option<Topic>> {
        let filter = TopicFilter::named(name).with_limit(1);
        Ok(self.store.read()?.find_topics(repo, &filter)?.into_iter().next())
    }

    /// Topics with a synonym starting with `prefix`, shortest names first
    pub fn find_topics_by_name(&self, repo: &RepositoryId, prefix: &str, limit: usize) -> GraphResult<Vec<Topic>> {
        let filter = TopicFilter::new().with_prefix(prefix).with_limit(limit);
        Ok(self.store.read()?.find_topics(repo, &filter)?)
    }

    pub fn descendants_of(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<BTreeSet<TopicId>> {
        let txn = self.store.read()?;
        Ok(index::descendants_of(&*txn, repo, topic)?)
    }

    pub fn descendant_links_of(&self, repo: &RepositoryId, topic: &TopicId) -> GraphResult<BTreeSet<LinkId>> {
        let txn = self.store.read()?;
        Ok(index::descendant_links_of(&*txn, repo, topic)?)
    }

    /// Scoped search from `base` with the engine's default locale
    ///
    /// The budget is clamped to `max_budget`. A budget of zero or less
    /// returns nothing without touching the store.
    pub fn search(
        &self,
        repo: &RepositoryId,
        spec: &QuerySpec,
        base: &TopicId,
        budget: i64,
    ) -> GraphResult<SearchResults> {
        self.search_in_locale(repo, spec, base, budget, &self.config.default_locale)
    }

    pub fn search_in_locale(
        &self,
        repo: &RepositoryId,
        spec: &QuerySpec,
        base: &TopicId,
        budget: i64,
        locale: &str,
    ) -> GraphResult<SearchResults> {
        let budget = self.config.clamp_budget(budget);
        if budget <= 0 {
            return Ok(SearchResults::default());
        }

        let query = SearchQuery::new(spec.clone(), base.clone())
            .with_budget(budget)
            .with_locale(locale);
        let txn = self.store.read()?;
        let results = query.execute(&*txn, repo)?;
        tracing::debug!(
            repository = %repo,
            query = %spec.raw_input,
            topics = results.topics.len(),
            links = results.links.len(),
            "search"
        );
        Ok(results)
    }

    fn sorted(&self, mut topics: Vec<Topic>) -> Vec<Topic> {
        let locale = &self.config.default_locale;
        topics.sort_by_cached_key(|t| (t.display_name(locale), t.id.clone()));
        topics
    }
}

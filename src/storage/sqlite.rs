//! SQLite storage backend for topicgraph

use super::traits::{GraphStore, GraphTxn, OpenStore, StorageError, StorageResult, TopicFilter};
use crate::graph::{
    Link, LinkEdge, LinkId, Repository, RepositoryId, Topic, TopicEdge, TopicId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TOPIC_COLUMNS: &str =
    "t.id, t.repository_id, t.synonyms_json, t.description, t.time_range_json, t.root, t.created_at";

const LINK_COLUMNS: &str = "l.id, l.repository_id, l.url, l.title, l.fingerprint, l.created_at";

/// (id, repository_id, synonyms_json, description, time_range_json, root, created_at)
type TopicRow = (String, String, String, Option<String>, Option<String>, bool, String);

/// (id, repository_id, url, title, fingerprint, created_at)
type LinkRow = (String, String, String, String, String, String);

/// SQLite-backed graph store
///
/// One database file holds every repository. Topics, links and both edge
/// kinds are plain tables; `topic_closure` and `link_closure` hold the
/// derived reachability relation and can be dropped and rebuilt from the
/// edge tables at any time.
///
/// Thread-safe via an internal mutex on the connection. A unit of work holds
/// the mutex for its whole lifetime, so a thread must not open a second unit
/// of work while one is live.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner TEXT,
                root_topic_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS topics (
                id TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                synonyms_json TEXT NOT NULL,
                description TEXT,
                time_range_json TEXT,
                root INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (repository_id, id),
                FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS links (
                id TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (repository_id, id),
                UNIQUE (repository_id, fingerprint),
                FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
            );

            -- Topic -> topic edges
            CREATE TABLE IF NOT EXISTS topic_topics (
                repository_id TEXT NOT NULL,
                parent_id TEXT NOT NULL,
                child_id TEXT NOT NULL,
                PRIMARY KEY (repository_id, parent_id, child_id),
                FOREIGN KEY (repository_id, parent_id) REFERENCES topics(repository_id, id) ON DELETE CASCADE,
                FOREIGN KEY (repository_id, child_id) REFERENCES topics(repository_id, id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_topic_topics_child
                ON topic_topics(repository_id, child_id);

            -- Topic -> link edges
            CREATE TABLE IF NOT EXISTS link_topics (
                repository_id TEXT NOT NULL,
                parent_id TEXT NOT NULL,
                link_id TEXT NOT NULL,
                PRIMARY KEY (repository_id, parent_id, link_id),
                FOREIGN KEY (repository_id, parent_id) REFERENCES topics(repository_id, id) ON DELETE CASCADE,
                FOREIGN KEY (repository_id, link_id) REFERENCES links(repository_id, id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_link_topics_link
                ON link_topics(repository_id, link_id);

            -- Derived: (ancestor, descendant) over topic edges, reflexive
            CREATE TABLE IF NOT EXISTS topic_closure (
                repository_id TEXT NOT NULL,
                ancestor_id TEXT NOT NULL,
                descendant_id TEXT NOT NULL,
                PRIMARY KEY (repository_id, ancestor_id, descendant_id)
            );
            CREATE INDEX IF NOT EXISTS idx_topic_closure_descendant
                ON topic_closure(repository_id, descendant_id);

            -- Derived: (ancestor topic, link)
            CREATE TABLE IF NOT EXISTS link_closure (
                repository_id TEXT NOT NULL,
                ancestor_id TEXT NOT NULL,
                link_id TEXT NOT NULL,
                PRIMARY KEY (repository_id, ancestor_id, link_id)
            );
            CREATE INDEX IF NOT EXISTS idx_link_closure_link
                ON link_closure(repository_id, link_id);
            "#,
        )?;

        // Lets other processes read the file while this one writes. Within one
        // store every unit of work still runs on the single connection, one
        // at a time.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(())
    }

    fn begin(&self, statement: &str) -> StorageResult<Box<dyn GraphTxn + '_>> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        conn.execute_batch(statement)?;
        Ok(Box::new(SqliteTxn { conn, open: true }))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    fn read(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        self.begin("BEGIN DEFERRED")
    }

    fn write(&self) -> StorageResult<Box<dyn GraphTxn + '_>> {
        // Take the write lock up front so the cycle check and the edge
        // insert see the same snapshot.
        self.begin("BEGIN IMMEDIATE")
    }
}

/// One open SQLite transaction
///
/// Rolls back on drop unless committed.
struct SqliteTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    open: bool,
}

impl Drop for SqliteTxn<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback failed");
            }
        }
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

fn row_to_topic(row: TopicRow) -> StorageResult<Topic> {
    let (id, repository_id, synonyms_json, description, time_range_json, root, created_at) = row;
    let time_range = match time_range_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    Ok(Topic {
        id: TopicId::from_string(id),
        repository_id: RepositoryId::from_string(repository_id),
        synonyms: serde_json::from_str(&synonyms_json)?,
        description,
        time_range,
        root,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn read_topic_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TopicRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn row_to_link(row: LinkRow) -> StorageResult<Link> {
    let (id, repository_id, url, title, fingerprint, created_at) = row;
    Ok(Link {
        id: LinkId::from_string(id),
        repository_id: RepositoryId::from_string(repository_id),
        title,
        url,
        fingerprint,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn read_link_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// `?2, ?3, ...` for `count` parameters following the repository ID
fn numbered_placeholders(count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteTxn<'_> {
    fn query_topics(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<Vec<Topic>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, read_topic_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_topic).collect()
    }

    fn query_links(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<Vec<Link>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, read_link_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_link).collect()
    }

    fn query_ids(&self, sql: &str, params: &[&dyn ToSql]) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl GraphTxn for SqliteTxn<'_> {
    // === Repository Operations ===

    fn save_repository(&mut self, repository: &Repository) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO repositories (id, name, owner, root_topic_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                owner = excluded.owner,
                root_topic_id = excluded.root_topic_id
            "#,
            params![
                repository.id.as_str(),
                repository.name,
                repository.owner,
                repository.root_topic_id.as_str(),
                repository.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_repository(&self, id: &RepositoryId) -> StorageResult<Option<Repository>> {
        let row: Option<(String, String, Option<String>, String, String)> = self
            .conn
            .query_row(
                "SELECT id, name, owner, root_topic_id, created_at FROM repositories WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((id, name, owner, root_topic_id, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(Repository {
            id: RepositoryId::from_string(id),
            name,
            owner,
            root_topic_id: TopicId::from_string(root_topic_id),
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    fn list_repositories(&self) -> StorageResult<Vec<Repository>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, owner, root_topic_id, created_at FROM repositories ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, owner, root_topic_id, created_at)| {
                Ok(Repository {
                    id: RepositoryId::from_string(id),
                    name,
                    owner,
                    root_topic_id: TopicId::from_string(root_topic_id),
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    // === Topic Operations ===

    fn save_topic(&mut self, topic: &Topic) -> StorageResult<()> {
        let synonyms_json = serde_json::to_string(&topic.synonyms)?;
        let time_range_json = match &topic.time_range {
            Some(range) => Some(serde_json::to_string(range)?),
            None => None,
        };

        self.conn.execute(
            r#"
            INSERT INTO topics (id, repository_id, synonyms_json, description, time_range_json, root, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(repository_id, id) DO UPDATE SET
                synonyms_json = excluded.synonyms_json,
                description = excluded.description,
                time_range_json = excluded.time_range_json,
                root = excluded.root
            "#,
            params![
                topic.id.as_str(),
                topic.repository_id.as_str(),
                synonyms_json,
                topic.description,
                time_range_json,
                topic.root,
                topic.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_topic(&self, repo: &RepositoryId, id: &TopicId) -> StorageResult<Option<Topic>> {
        let row: Option<TopicRow> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM topics t WHERE t.repository_id = ?1 AND t.id = ?2",
                    TOPIC_COLUMNS
                ),
                params![repo.as_str(), id.as_str()],
                read_topic_row,
            )
            .optional()?;

        row.map(row_to_topic).transpose()
    }

    fn load_topics(&self, repo: &RepositoryId, ids: &[TopicId]) -> StorageResult<Vec<Topic>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let repo_str = repo.as_str();
        let ids: Vec<&str> = ids.iter().map(TopicId::as_str).collect();
        let sql = format!(
            "SELECT {} FROM topics t WHERE t.repository_id = ?1 AND t.id IN ({})",
            TOPIC_COLUMNS,
            numbered_placeholders(ids.len())
        );
        let mut params: Vec<&dyn ToSql> = vec![&repo_str];
        params.extend(ids.iter().map(|id| id as &dyn ToSql));
        self.query_topics(&sql, &params)
    }

    fn topic_ids(&self, repo: &RepositoryId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT id FROM topics WHERE repository_id = ?1 ORDER BY id",
            params![repo.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn count_topics(&self, repo: &RepositoryId) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM topics WHERE repository_id = ?1",
            params![repo.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn find_topics(&self, repo: &RepositoryId, filter: &TopicFilter) -> StorageResult<Vec<Topic>> {
        // SQLite's lower() and LIKE fold ASCII only, so names are compared here
        let candidates = self.query_topics(
            &format!("SELECT {} FROM topics t WHERE t.repository_id = ?1", TOPIC_COLUMNS),
            params![repo.as_str()],
        )?;

        let mut matched: Vec<(usize, Topic)> = candidates
            .into_iter()
            .filter(|topic| {
                filter
                    .name
                    .as_deref()
                    .map_or(true, |name| topic.synonyms.contains_name(name))
            })
            .filter_map(|topic| {
                let prefix = filter.name_prefix.as_deref().unwrap_or("");
                let shortest = topic.synonyms.shortest_with_prefix(prefix)?;
                Some((shortest, topic))
            })
            .collect();
        matched.sort_by(|(a_len, a), (b_len, b)| a_len.cmp(b_len).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched.into_iter().map(|(_, topic)| topic).collect())
    }

    fn delete_topic(&mut self, repo: &RepositoryId, id: &TopicId) -> StorageResult<bool> {
        // Delete edges touching this topic
        self.conn.execute(
            "DELETE FROM topic_topics WHERE repository_id = ?1 AND (parent_id = ?2 OR child_id = ?2)",
            params![repo.as_str(), id.as_str()],
        )?;
        self.conn.execute(
            "DELETE FROM link_topics WHERE repository_id = ?1 AND parent_id = ?2",
            params![repo.as_str(), id.as_str()],
        )?;

        let rows = self.conn.execute(
            "DELETE FROM topics WHERE repository_id = ?1 AND id = ?2",
            params![repo.as_str(), id.as_str()],
        )?;
        Ok(rows > 0)
    }

    // === Link Operations ===

    fn save_link(&mut self, link: &Link) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO links (id, repository_id, url, title, fingerprint, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(repository_id, id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                fingerprint = excluded.fingerprint
            "#,
            params![
                link.id.as_str(),
                link.repository_id.as_str(),
                link.url,
                link.title,
                link.fingerprint,
                link.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_link(&self, repo: &RepositoryId, id: &LinkId) -> StorageResult<Option<Link>> {
        let row: Option<LinkRow> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM links l WHERE l.repository_id = ?1 AND l.id = ?2",
                    LINK_COLUMNS
                ),
                params![repo.as_str(), id.as_str()],
                read_link_row,
            )
            .optional()?;

        row.map(row_to_link).transpose()
    }

    fn load_link_by_fingerprint(
        &self,
        repo: &RepositoryId,
        fingerprint: &str,
    ) -> StorageResult<Option<Link>> {
        let row: Option<LinkRow> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM links l WHERE l.repository_id = ?1 AND l.fingerprint = ?2",
                    LINK_COLUMNS
                ),
                params![repo.as_str(), fingerprint],
                read_link_row,
            )
            .optional()?;

        row.map(row_to_link).transpose()
    }

    fn load_links(&self, repo: &RepositoryId, ids: &[LinkId]) -> StorageResult<Vec<Link>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let repo_str = repo.as_str();
        let ids: Vec<&str> = ids.iter().map(LinkId::as_str).collect();
        let sql = format!(
            "SELECT {} FROM links l WHERE l.repository_id = ?1 AND l.id IN ({})",
            LINK_COLUMNS,
            numbered_placeholders(ids.len())
        );
        let mut params: Vec<&dyn ToSql> = vec![&repo_str];
        params.extend(ids.iter().map(|id| id as &dyn ToSql));
        self.query_links(&sql, &params)
    }

    fn delete_link(&mut self, repo: &RepositoryId, id: &LinkId) -> StorageResult<bool> {
        self.conn.execute(
            "DELETE FROM link_topics WHERE repository_id = ?1 AND link_id = ?2",
            params![repo.as_str(), id.as_str()],
        )?;
        self.conn.execute(
            "DELETE FROM link_closure WHERE repository_id = ?1 AND link_id = ?2",
            params![repo.as_str(), id.as_str()],
        )?;
        let rows = self.conn.execute(
            "DELETE FROM links WHERE repository_id = ?1 AND id = ?2",
            params![repo.as_str(), id.as_str()],
        )?;
        Ok(rows > 0)
    }

    // === Edge Operations ===

    fn insert_topic_edge(&mut self, repo: &RepositoryId, edge: &TopicEdge) -> StorageResult<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO topic_topics (repository_id, parent_id, child_id) VALUES (?1, ?2, ?3)",
            params![repo.as_str(), edge.parent.as_str(), edge.child.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn delete_topic_edge(&mut self, repo: &RepositoryId, edge: &TopicEdge) -> StorageResult<bool> {
        let rows = self.conn.execute(
            "DELETE FROM topic_topics WHERE repository_id = ?1 AND parent_id = ?2 AND child_id = ?3",
            params![repo.as_str(), edge.parent.as_str(), edge.child.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn insert_link_edge(&mut self, repo: &RepositoryId, edge: &LinkEdge) -> StorageResult<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO link_topics (repository_id, parent_id, link_id) VALUES (?1, ?2, ?3)",
            params![repo.as_str(), edge.parent.as_str(), edge.link.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn delete_link_edge(&mut self, repo: &RepositoryId, edge: &LinkEdge) -> StorageResult<bool> {
        let rows = self.conn.execute(
            "DELETE FROM link_topics WHERE repository_id = ?1 AND parent_id = ?2 AND link_id = ?3",
            params![repo.as_str(), edge.parent.as_str(), edge.link.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn parent_topic_ids(&self, repo: &RepositoryId, child: &TopicId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT parent_id FROM topic_topics WHERE repository_id = ?1 AND child_id = ?2 ORDER BY parent_id",
            params![repo.as_str(), child.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn child_topic_ids(&self, repo: &RepositoryId, parent: &TopicId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT child_id FROM topic_topics WHERE repository_id = ?1 AND parent_id = ?2 ORDER BY child_id",
            params![repo.as_str(), parent.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn link_parent_ids(&self, repo: &RepositoryId, link: &LinkId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT parent_id FROM link_topics WHERE repository_id = ?1 AND link_id = ?2 ORDER BY parent_id",
            params![repo.as_str(), link.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn child_link_ids(&self, repo: &RepositoryId, parent: &TopicId) -> StorageResult<Vec<LinkId>> {
        let ids = self.query_ids(
            "SELECT link_id FROM link_topics WHERE repository_id = ?1 AND parent_id = ?2 ORDER BY link_id",
            params![repo.as_str(), parent.as_str()],
        )?;
        Ok(ids.into_iter().map(LinkId::from).collect())
    }

    fn topic_edges(&self, repo: &RepositoryId) -> StorageResult<Vec<TopicEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT parent_id, child_id FROM topic_topics WHERE repository_id = ?1 ORDER BY parent_id, child_id",
        )?;
        let edges = stmt
            .query_map(params![repo.as_str()], |row| {
                Ok(TopicEdge::new(
                    TopicId::from_string(row.get::<_, String>(0)?),
                    TopicId::from_string(row.get::<_, String>(1)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn link_edges(&self, repo: &RepositoryId) -> StorageResult<Vec<LinkEdge>> {
        let mut stmt = self.conn.prepare(
            "SELECT parent_id, link_id FROM link_topics WHERE repository_id = ?1 ORDER BY parent_id, link_id",
        )?;
        let edges = stmt
            .query_map(params![repo.as_str()], |row| {
                Ok(LinkEdge::new(
                    TopicId::from_string(row.get::<_, String>(0)?),
                    LinkId::from_string(row.get::<_, String>(1)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    // === Closure Operations ===

    fn closure_contains(
        &self,
        repo: &RepositoryId,
        ancestor: &TopicId,
        descendant: &TopicId,
    ) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM topic_closure WHERE repository_id = ?1 AND ancestor_id = ?2 AND descendant_id = ?3",
                params![repo.as_str(), ancestor.as_str(), descendant.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn closure_ancestors(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT ancestor_id FROM topic_closure WHERE repository_id = ?1 AND descendant_id = ?2 ORDER BY ancestor_id",
            params![repo.as_str(), topic.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn closure_descendants(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<TopicId>> {
        let ids = self.query_ids(
            "SELECT descendant_id FROM topic_closure WHERE repository_id = ?1 AND ancestor_id = ?2 ORDER BY descendant_id",
            params![repo.as_str(), topic.as_str()],
        )?;
        Ok(ids.into_iter().map(TopicId::from).collect())
    }

    fn closure_links(&self, repo: &RepositoryId, topic: &TopicId) -> StorageResult<Vec<LinkId>> {
        let ids = self.query_ids(
            "SELECT link_id FROM link_closure WHERE repository_id = ?1 AND ancestor_id = ?2 ORDER BY link_id",
            params![repo.as_str(), topic.as_str()],
        )?;
        Ok(ids.into_iter().map(LinkId::from).collect())
    }

    fn insert_topic_closure(
        &mut self,
        repo: &RepositoryId,
        pairs: &[(TopicId, TopicId)],
    ) -> StorageResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO topic_closure (repository_id, ancestor_id, descendant_id) VALUES (?1, ?2, ?3)",
        )?;
        for (ancestor, descendant) in pairs {
            stmt.execute(params![repo.as_str(), ancestor.as_str(), descendant.as_str()])?;
        }
        Ok(())
    }

    fn insert_link_closure(
        &mut self,
        repo: &RepositoryId,
        pairs: &[(TopicId, LinkId)],
    ) -> StorageResult<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO link_closure (repository_id, ancestor_id, link_id) VALUES (?1, ?2, ?3)",
        )?;
        for (ancestor, link) in pairs {
            stmt.execute(params![repo.as_str(), ancestor.as_str(), link.as_str()])?;
        }
        Ok(())
    }

    fn clear_link_closure(&mut self, repo: &RepositoryId, link: &LinkId) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM link_closure WHERE repository_id = ?1 AND link_id = ?2",
            params![repo.as_str(), link.as_str()],
        )?;
        Ok(())
    }

    fn clear_closure(&mut self, repo: &RepositoryId) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM topic_closure WHERE repository_id = ?1",
            params![repo.as_str()],
        )?;
        self.conn.execute(
            "DELETE FROM link_closure WHERE repository_id = ?1",
            params![repo.as_str()],
        )?;
        Ok(())
    }

    // === Scoped Reads ===

    fn topics_within(&self, repo: &RepositoryId, scopes: &[TopicId]) -> StorageResult<Vec<Topic>> {
        let scopes: BTreeSet<&str> = scopes.iter().map(TopicId::as_str).collect();
        if scopes.is_empty() {
            return Ok(Vec::new());
        }

        // A descendant qualifies only if every scope reaches it
        let sql = format!(
            r#"
            SELECT {} FROM topics t
            WHERE t.repository_id = ?1 AND t.id IN (
                SELECT descendant_id FROM topic_closure
                WHERE repository_id = ?1 AND ancestor_id IN ({})
                GROUP BY descendant_id
                HAVING COUNT(DISTINCT ancestor_id) = {}
            )
            "#,
            TOPIC_COLUMNS,
            numbered_placeholders(scopes.len()),
            scopes.len()
        );

        let repo_str = repo.as_str();
        let mut params: Vec<&dyn ToSql> = vec![&repo_str];
        params.extend(scopes.iter().map(|id| id as &dyn ToSql));
        self.query_topics(&sql, &params)
    }

    fn links_within(&self, repo: &RepositoryId, scopes: &[TopicId]) -> StorageResult<Vec<Link>> {
        let scopes: BTreeSet<&str> = scopes.iter().map(TopicId::as_str).collect();
        if scopes.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {} FROM links l
            WHERE l.repository_id = ?1 AND l.id IN (
                SELECT link_id FROM link_closure
                WHERE repository_id = ?1 AND ancestor_id IN ({})
                GROUP BY link_id
                HAVING COUNT(DISTINCT ancestor_id) = {}
            )
            "#,
            LINK_COLUMNS,
            numbered_placeholders(scopes.len()),
            scopes.len()
        );

        let repo_str = repo.as_str();
        let mut params: Vec<&dyn ToSql> = vec![&repo_str];
        params.extend(scopes.iter().map(|id| id as &dyn ToSql));
        self.query_links(&sql, &params)
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BasicCanonicalizer, Synonym, UrlCanonicalizer};

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    /// Repository with a root topic, committed
    fn seed(store: &SqliteStore) -> (RepositoryId, TopicId) {
        let repo_id = RepositoryId::from("repo:test");
        let root = Topic::root(repo_id.clone(), "Everything").with_id(TopicId::from("root"));
        let repo = Repository::new("test", root.id.clone()).with_id(repo_id.clone());

        let mut txn = store.write().unwrap();
        txn.save_repository(&repo).unwrap();
        txn.save_topic(&root).unwrap();
        txn.insert_topic_closure(&repo_id, &[(root.id.clone(), root.id.clone())])
            .unwrap();
        txn.commit().unwrap();
        (repo_id, root.id)
    }

    fn topic(repo: &RepositoryId, id: &str, name: &str) -> Topic {
        Topic::new(repo.clone(), Synonym::en(name)).with_id(TopicId::from(id))
    }

    #[test]
    fn test_save_and_load_repository() {
        let store = create_test_store();
        let (repo_id, root) = seed(&store);

        let txn = store.read().unwrap();
        let loaded = txn.load_repository(&repo_id).unwrap().unwrap();
        assert_eq!(loaded.name, "test");
        assert_eq!(loaded.root_topic_id, root);
        assert_eq!(txn.list_repositories().unwrap().len(), 1);
        assert!(txn
            .load_repository(&RepositoryId::from("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_topic_roundtrip_preserves_synonyms() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);

        let t = topic(&repo_id, "car", "Car")
            .with_synonym(Synonym::new("fr", "Voiture"))
            .with_description("four wheels");
        let mut txn = store.write().unwrap();
        txn.save_topic(&t).unwrap();
        txn.commit().unwrap();

        let txn = store.read().unwrap();
        let loaded = txn.load_topic(&repo_id, &t.id).unwrap().unwrap();
        assert_eq!(loaded.synonyms, t.synonyms);
        assert_eq!(loaded.description.as_deref(), Some("four wheels"));
        assert!(!loaded.root);
        assert_eq!(txn.count_topics(&repo_id).unwrap(), 2);
    }

    #[test]
    fn test_dropped_txn_rolls_back() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);

        {
            let mut txn = store.write().unwrap();
            txn.save_topic(&topic(&repo_id, "ghost", "Ghost")).unwrap();
            // dropped without commit
        }

        let txn = store.read().unwrap();
        assert!(txn
            .load_topic(&repo_id, &TopicId::from("ghost"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_edge_insert_is_idempotent() {
        let store = create_test_store();
        let (repo_id, root) = seed(&store);

        let mut txn = store.write().unwrap();
        let child = topic(&repo_id, "child", "Child");
        txn.save_topic(&child).unwrap();
        let edge = TopicEdge::new(root.clone(), child.id.clone());
        assert!(txn.insert_topic_edge(&repo_id, &edge).unwrap());
        assert!(!txn.insert_topic_edge(&repo_id, &edge).unwrap());
        assert_eq!(txn.parent_topic_ids(&repo_id, &child.id).unwrap(), vec![root.clone()]);
        assert_eq!(txn.child_topic_ids(&repo_id, &root).unwrap(), vec![child.id.clone()]);

        assert!(txn.delete_topic_edge(&repo_id, &edge).unwrap());
        assert!(!txn.delete_topic_edge(&repo_id, &edge).unwrap());
    }

    #[test]
    fn test_delete_topic_removes_edges() {
        let store = create_test_store();
        let (repo_id, root) = seed(&store);

        let mut txn = store.write().unwrap();
        let a = topic(&repo_id, "a", "A");
        txn.save_topic(&a).unwrap();
        txn.insert_topic_edge(&repo_id, &TopicEdge::new(root.clone(), a.id.clone()))
            .unwrap();

        let canonical = BasicCanonicalizer
            .canonicalize("https://example.com")
            .unwrap();
        let link = Link::new(repo_id.clone(), canonical, "Example");
        txn.save_link(&link).unwrap();
        txn.insert_link_edge(&repo_id, &LinkEdge::new(a.id.clone(), link.id.clone()))
            .unwrap();

        assert!(txn.delete_topic(&repo_id, &a.id).unwrap());
        assert!(txn.topic_edges(&repo_id).unwrap().is_empty());
        assert!(txn.link_edges(&repo_id).unwrap().is_empty());
        assert!(!txn.delete_topic(&repo_id, &a.id).unwrap());
    }

    #[test]
    fn test_find_topics_by_name_is_case_insensitive() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);

        let mut txn = store.write().unwrap();
        txn.save_topic(&topic(&repo_id, "agri", "Agriculture")).unwrap();
        txn.save_topic(
            &topic(&repo_id, "crop", "Crop rotation").with_synonym(Synonym::new("fr", "Assolement")),
        )
        .unwrap();
        txn.commit().unwrap();

        let txn = store.read().unwrap();
        let found = txn
            .find_topics(&repo_id, &TopicFilter::named("AGRICULTURE"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "agri");

        let found = txn
            .find_topics(&repo_id, &TopicFilter::new().with_prefix("asso"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "crop");

        // No wildcards in a prefix
        let found = txn
            .find_topics(&repo_id, &TopicFilter::new().with_prefix("%"))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_topics_folds_non_ascii_case() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);

        let mut txn = store.write().unwrap();
        txn.save_topic(&topic(&repo_id, "eco", "Économie")).unwrap();
        txn.save_topic(&topic(&repo_id, "ecol", "Écologie des sols")).unwrap();
        txn.commit().unwrap();

        let txn = store.read().unwrap();
        let found = txn
            .find_topics(&repo_id, &TopicFilter::named("économie"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "eco");

        let found = txn
            .find_topics(&repo_id, &TopicFilter::new().with_prefix("éco"))
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["eco", "ecol"]);

        let found = txn
            .find_topics(&repo_id, &TopicFilter::new().with_prefix("ÉCO").with_limit(1))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_link_fingerprint_is_unique_per_repository() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);
        let canonical = BasicCanonicalizer
            .canonicalize("https://example.com/a")
            .unwrap();

        let mut txn = store.write().unwrap();
        let first = Link::new(repo_id.clone(), canonical.clone(), "A");
        txn.save_link(&first).unwrap();
        let loaded = txn
            .load_link_by_fingerprint(&repo_id, &canonical.fingerprint)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, first.id);

        let second = Link::new(repo_id.clone(), canonical, "B");
        assert!(matches!(
            txn.save_link(&second),
            Err(StorageError::Database(_))
        ));
    }

    #[test]
    fn test_topics_within_requires_every_scope() {
        let store = create_test_store();
        let (repo_id, root) = seed(&store);
        let a = TopicId::from("a");
        let b = TopicId::from("b");
        let both = TopicId::from("both");

        let mut txn = store.write().unwrap();
        for (id, name) in [("a", "A"), ("b", "B"), ("both", "Both")] {
            txn.save_topic(&topic(&repo_id, id, name)).unwrap();
        }
        txn.insert_topic_closure(
            &repo_id,
            &[
                (root.clone(), a.clone()),
                (root.clone(), b.clone()),
                (root.clone(), both.clone()),
                (a.clone(), a.clone()),
                (b.clone(), b.clone()),
                (both.clone(), both.clone()),
                (a.clone(), both.clone()),
                (b.clone(), both.clone()),
            ],
        )
        .unwrap();
        txn.commit().unwrap();

        let txn = store.read().unwrap();
        let within = txn
            .topics_within(&repo_id, &[a.clone(), b.clone()])
            .unwrap();
        let ids: Vec<_> = within.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![both.clone()]);

        let within = txn.topics_within(&repo_id, &[a.clone()]).unwrap();
        assert_eq!(within.len(), 2);

        // Duplicated scopes count once
        let within = txn.topics_within(&repo_id, &[a.clone(), a]).unwrap();
        assert_eq!(within.len(), 2);

        assert!(txn.topics_within(&repo_id, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_repositories_are_isolated() {
        let store = create_test_store();
        let (repo_id, _) = seed(&store);
        let other = RepositoryId::from("repo:other");

        let txn = store.read().unwrap();
        assert_eq!(txn.count_topics(&repo_id).unwrap(), 1);
        assert_eq!(txn.count_topics(&other).unwrap(), 0);
        assert!(txn.closure_descendants(&other, &TopicId::from("root")).unwrap().is_empty());
    }

    #[test]
    fn test_wal_mode_enabled_for_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let store = SqliteStore::open(&path).unwrap();

        let conn = store.conn.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");

        let repo_id = {
            let store = SqliteStore::open(&path).unwrap();
            seed(&store).0
        };

        let store = SqliteStore::open(&path).unwrap();
        let txn = store.read().unwrap();
        assert!(txn.load_repository(&repo_id).unwrap().is_some());
        assert_eq!(
            txn.closure_descendants(&repo_id, &TopicId::from("root")).unwrap(),
            vec![TopicId::from("root")]
        );
    }
}

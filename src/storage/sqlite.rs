//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the GraphStore trait.
//! Nodes, labels and edges live in plain tables; leaf-ness is computed at
//! query time from the absence of outgoing edges.

use crate::config::DatabaseConfig;
use crate::extract::Page;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GraphStore, PersistenceError, StorageResult};
use crate::storage::{
    decode_choices, EdgeRecord, LeafRecord, NodeSummary, RunRecord, RunStatus, UpsertOutcome,
};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Format used for the stored publish date
const STORED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// How long a write waits on another session's lock before failing
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite graph store session
pub struct SqliteGraphStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteGraphStore {
    /// Opens the configured database, creating the schema if needed
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteGraphStore)` - Successfully opened/created database
    /// * `Err(PersistenceError)` - Failed to open database
    pub fn open(config: &DatabaseConfig) -> StorageResult<Self> {
        if config.has_credentials() {
            tracing::warn!("SQLite backend has no authentication; configured credentials are ignored");
        }
        Self::open_path(&config.database_path())
    }

    /// Opens a database file directly, creating the schema if needed
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        let store = Self::connect(path)?;
        initialize_schema(&store.conn)?;
        Ok(store)
    }

    /// Opens a session on an already-initialized database file
    ///
    /// Every concurrent unit of work (a page write, a connection worker)
    /// opens its own session this way and shuts it down when done.
    pub fn connect(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(WRITE_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads a page by URL, including its labels
    pub fn get_page(&self, url: &str) -> StorageResult<Option<Page>> {
        self.load_page(
            "SELECT id, url, title, text, date, author, choices FROM nodes WHERE url = ?1",
            url,
        )
    }

    /// Loads a page by its opaque short id
    pub fn get_page_by_id(&self, short_id: &str) -> StorageResult<Option<Page>> {
        self.load_page(
            "SELECT id, url, title, text, date, author, choices FROM nodes WHERE short_id = ?1",
            short_id,
        )
    }

    /// Returns the short id assigned to the node with this URL
    pub fn short_id_of(&self, url: &str) -> StorageResult<Option<String>> {
        let short_id = self
            .conn
            .query_row(
                "SELECT short_id FROM nodes WHERE url = ?1",
                params![url],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(short_id.flatten())
    }

    /// Lists nodes carrying every one of `tags`, in creation order
    ///
    /// An empty tag list matches every node. Labels are compared exactly,
    /// so callers should pass normalized tags.
    pub fn find_by_tags(&self, tags: &[&str]) -> StorageResult<Vec<NodeSummary>> {
        let wanted: BTreeSet<&str> = tags.iter().copied().collect();

        let sql = if wanted.is_empty() {
            "SELECT id, short_id, url, title FROM nodes ORDER BY id".to_string()
        } else {
            format!(
                "SELECT n.id, n.short_id, n.url, n.title FROM nodes n
                 WHERE (SELECT COUNT(*) FROM node_labels l
                        WHERE l.node_id = n.id AND l.label IN ({})) = {}
                 ORDER BY n.id",
                vec!["?"; wanted.len()].join(", "),
                wanted.len()
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(wanted.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut nodes = Vec::with_capacity(rows.len());
        for (id, short_id, url, title) in rows {
            nodes.push(NodeSummary {
                short_id: short_id.unwrap_or_default(),
                url,
                title,
                labels: self.labels_of(id)?,
            });
        }
        Ok(nodes)
    }

    fn load_page(&self, query: &str, key: &str) -> StorageResult<Option<Page>> {
        let row = self
            .conn
            .query_row(query, params![key], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()?;

        let Some((id, url, title, text, date, author, choices)) = row else {
            return Ok(None);
        };

        let date = date
            .map(|raw| {
                NaiveDateTime::parse_from_str(&raw, STORED_DATE_FORMAT)
                    .map_err(|_| PersistenceError::Timestamp(raw))
            })
            .transpose()?;

        Ok(Some(Page {
            url,
            title,
            text,
            date,
            author,
            tags: self.labels_of(id)?,
            choices: decode_choices(&choices)?,
        }))
    }

    fn labels_of(&self, node_id: i64) -> StorageResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT label FROM node_labels WHERE node_id = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![node_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(labels)
    }

    /// Gets all outgoing edges of a node
    pub fn outgoing_edges(&self, parent_url: &str) -> StorageResult<Vec<EdgeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.url, c.url, e.choice_text FROM edges e
             JOIN nodes p ON p.id = e.parent_id
             JOIN nodes c ON c.id = e.child_id
             WHERE p.url = ?1
             ORDER BY e.id",
        )?;

        let edges = stmt
            .query_map(params![parent_url], |row| {
                Ok(EdgeRecord {
                    parent_url: row.get(0)?,
                    child_url: row.get(1)?,
                    choice_text: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(edges)
    }

    /// Counts the total number of edges
    pub fn count_edges(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Counts nodes that currently have no outgoing edges
    pub fn count_leaves(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM nodes n
             WHERE NOT EXISTS (SELECT 1 FROM edges e WHERE e.parent_id = n.id)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    /// Creates a new run in the `running` state
    pub fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Records the end of a run with its final status and counts
    pub fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_written: u64,
        edges_created: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_written = ?3, edges_created = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_written as i64,
                edges_created as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, pages_written, edges_created
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Failed),
                        pages_written: row.get::<_, i64>(5)? as u64,
                        edges_created: row.get::<_, i64>(6)? as u64,
                    })
                },
            )
            .optional()?;

        Ok(run)
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_node(&mut self, page: &Page) -> StorageResult<UpsertOutcome> {
        let choices = serde_json::to_string(&page.choices)?;
        let date = page
            .date
            .map(|date| date.format(STORED_DATE_FORMAT).to_string());
        let now = Utc::now().to_rfc3339();

        // Take the write lock up front so concurrent upserts of one URL serialize
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM nodes WHERE url = ?1", params![page.url], |row| {
                row.get(0)
            })
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE nodes SET title = ?1, text = ?2, date = ?3, author = ?4, choices = ?5,
                     updated_at = ?6 WHERE id = ?7",
                    params![page.title, page.text, date, page.author, choices, now, id],
                )?;
                UpsertOutcome::Updated
            }
            None => {
                let short_id = Uuid::new_v4().simple().to_string();
                tx.execute(
                    "INSERT INTO nodes (short_id, url, title, text, date, author, choices, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                    params![
                        short_id,
                        page.url,
                        page.title,
                        page.text,
                        date,
                        page.author,
                        choices,
                        now
                    ],
                )?;
                let id = tx.last_insert_rowid();

                for tag in &page.tags {
                    tx.execute(
                        "INSERT OR IGNORE INTO node_labels (node_id, label) VALUES (?1, ?2)",
                        params![id, tag],
                    )?;
                }
                UpsertOutcome::Created
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn get_leaf_urls(&self) -> StorageResult<BTreeSet<String>> {
        let mut urls = BTreeSet::new();
        for leaf in self.leaf_snapshot()? {
            urls.extend(decode_choices(&leaf.choices)?.into_values());
        }
        Ok(urls)
    }

    fn get_node_count(&self) -> u64 {
        match self
            .conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get::<_, i64>(0))
        {
            Ok(count) => count as u64,
            Err(e) => {
                tracing::warn!("Node count query failed, treating store as empty: {}", e);
                0
            }
        }
    }

    fn create_edge(
        &mut self,
        parent_url: &str,
        child_url: &str,
        choice_text: &str,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let created = self.conn.execute(
            "INSERT INTO edges (parent_id, child_id, choice_text, created_at)
             SELECT p.id, c.id, ?3, ?4 FROM nodes p, nodes c
             WHERE p.url = ?1 AND c.url = ?2",
            params![parent_url, child_url, choice_text, now],
        )?;
        Ok(created > 0)
    }

    fn leaf_snapshot(&self) -> StorageResult<Vec<LeafRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.url, n.choices FROM nodes n
             WHERE NOT EXISTS (SELECT 1 FROM edges e WHERE e.parent_id = n.id)
             ORDER BY n.id",
        )?;

        let leaves = stmt
            .query_map([], |row| {
                Ok(LeafRecord {
                    url: row.get(0)?,
                    choices: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(leaves)
    }

    fn shutdown(self) {
        if let Err((_, e)) = self.conn.close() {
            tracing::warn!("Failed to close database session cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, SqliteGraphStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open_path(&dir.path().join("graph.db")).unwrap();
        (dir, store)
    }

    fn page(url: &str, choices: &[(&str, &str)]) -> Page {
        let mut page = Page::new(url);
        page.title = format!("Title of {}", url);
        for (text, target) in choices {
            page.choices.insert(text.to_string(), target.to_string());
        }
        page
    }

    #[test]
    fn test_open_creates_database() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get_node_count(), 0);
        assert!(store.get_leaf_urls().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (_dir, mut store) = temp_store();

        let mut first = page("https://ex.com/1", &[("a", "https://ex.com/2")]);
        first.text = "first".to_string();
        assert_eq!(store.upsert_node(&first).unwrap(), UpsertOutcome::Created);

        let mut second = page("https://ex.com/1", &[("b", "https://ex.com/3")]);
        second.text = "second".to_string();
        second.author = Some("Someone".to_string());
        assert_eq!(store.upsert_node(&second).unwrap(), UpsertOutcome::Updated);

        assert_eq!(store.get_node_count(), 1);
        let stored = store.get_page("https://ex.com/1").unwrap().unwrap();
        assert_eq!(stored.text, "second");
        assert_eq!(stored.author.as_deref(), Some("Someone"));
        assert_eq!(stored.choices.len(), 1);
        assert_eq!(stored.choices["b"], "https://ex.com/3");
    }

    #[test]
    fn test_tags_attached_on_create_only() {
        let (_dir, mut store) = temp_store();

        let mut first = page("https://ex.com/1", &[]);
        first.tags.insert("sci_fi".to_string());
        store.upsert_node(&first).unwrap();

        let mut second = page("https://ex.com/1", &[]);
        second.tags.insert("horror".to_string());
        store.upsert_node(&second).unwrap();

        let stored = store.get_page("https://ex.com/1").unwrap().unwrap();
        let expected: BTreeSet<String> = ["sci_fi".to_string()].into_iter().collect();
        assert_eq!(stored.tags, expected);
    }

    #[test]
    fn test_date_roundtrip() {
        let (_dir, mut store) = temp_store();
        let mut p = page("https://ex.com/1", &[]);
        p.date = NaiveDate::from_ymd_opt(2006, 1, 2).and_then(|d| d.and_hms_opt(15, 4, 5));
        store.upsert_node(&p).unwrap();

        let stored = store.get_page("https://ex.com/1").unwrap().unwrap();
        assert_eq!(stored.date, p.date);
    }

    #[test]
    fn test_missing_page_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get_page("https://ex.com/missing").unwrap().is_none());
    }

    #[test]
    fn test_leaf_detection_tracks_edges() {
        let (_dir, mut store) = temp_store();
        store
            .upsert_node(&page("https://ex.com/1", &[("go", "https://ex.com/2")]))
            .unwrap();
        store
            .upsert_node(&page("https://ex.com/2", &[("on", "https://ex.com/3")]))
            .unwrap();

        let leaves = store.get_leaf_urls().unwrap();
        assert!(leaves.contains("https://ex.com/2"));
        assert!(leaves.contains("https://ex.com/3"));
        assert_eq!(store.count_leaves().unwrap(), 2);

        assert!(store
            .create_edge("https://ex.com/1", "https://ex.com/2", "go")
            .unwrap());

        let leaves = store.get_leaf_urls().unwrap();
        assert!(!leaves.contains("https://ex.com/2"));
        assert!(leaves.contains("https://ex.com/3"));
        assert_eq!(store.count_leaves().unwrap(), 1);
    }

    #[test]
    fn test_leaf_urls_fail_on_corrupt_choice_map() {
        let (_dir, store) = temp_store();
        store
            .conn
            .execute(
                "INSERT INTO nodes (url, choices, created_at, updated_at) VALUES ('u', '{bad', 'x', 'x')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.get_leaf_urls(),
            Err(PersistenceError::ChoiceMap(_))
        ));
    }

    #[test]
    fn test_create_edge_missing_endpoint_is_noop() {
        let (_dir, mut store) = temp_store();
        store.upsert_node(&page("https://ex.com/1", &[])).unwrap();

        let created = store
            .create_edge("https://ex.com/1", "https://ex.com/absent", "go")
            .unwrap();
        assert!(!created);

        let created = store
            .create_edge("https://ex.com/absent", "https://ex.com/1", "go")
            .unwrap();
        assert!(!created);
        assert_eq!(store.count_edges().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_edges_allowed() {
        let (_dir, mut store) = temp_store();
        store.upsert_node(&page("https://ex.com/1", &[])).unwrap();
        store.upsert_node(&page("https://ex.com/2", &[])).unwrap();

        store.create_edge("https://ex.com/1", "https://ex.com/2", "go").unwrap();
        store.create_edge("https://ex.com/1", "https://ex.com/2", "go").unwrap();
        store.create_edge("https://ex.com/1", "https://ex.com/2", "run").unwrap();

        let edges = store.outgoing_edges("https://ex.com/1").unwrap();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[2].choice_text, "run");
        assert_eq!(edges[2].child_url, "https://ex.com/2");
    }

    #[test]
    fn test_missing_directory_surfaces_as_sqlite_error() {
        let dir = TempDir::new().unwrap();
        let result = SqliteGraphStore::connect(&dir.path().join("missing").join("graph.db"));
        assert!(matches!(result, Err(PersistenceError::Sqlite(_))));
    }

    #[test]
    fn test_sessions_share_database() {
        let (_dir, mut store) = temp_store();
        let session = SqliteGraphStore::connect(store.path()).unwrap();

        store.upsert_node(&page("https://ex.com/1", &[])).unwrap();
        assert_eq!(session.get_node_count(), 1);
        session.shutdown();
    }

    #[test]
    fn test_run_lifecycle() {
        let (_dir, mut store) = temp_store();
        assert!(store.get_latest_run().unwrap().is_none());

        let run_id = store.create_run("abc123").unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        store
            .finish_run(run_id, RunStatus::Completed, 12, 9)
            .unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.pages_written, 12);
        assert_eq!(run.edges_created, 9);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_short_id_assigned_on_create_and_kept_on_update() {
        let (_dir, mut store) = temp_store();
        store.upsert_node(&page("https://ex.com/1", &[])).unwrap();
        store.upsert_node(&page("https://ex.com/2", &[])).unwrap();

        let first = store.short_id_of("https://ex.com/1").unwrap().unwrap();
        let second = store.short_id_of("https://ex.com/2").unwrap().unwrap();
        assert_ne!(first, second);

        let mut rewritten = page("https://ex.com/1", &[]);
        rewritten.text = "rewritten".to_string();
        store.upsert_node(&rewritten).unwrap();
        assert_eq!(store.short_id_of("https://ex.com/1").unwrap().unwrap(), first);

        let loaded = store.get_page_by_id(&first).unwrap().unwrap();
        assert_eq!(loaded.url, "https://ex.com/1");
        assert_eq!(loaded.text, "rewritten");

        assert!(store.get_page_by_id("no-such-id").unwrap().is_none());
        assert!(store.short_id_of("https://ex.com/missing").unwrap().is_none());
    }

    #[test]
    fn test_find_by_tags_requires_every_tag() {
        let (_dir, mut store) = temp_store();

        let mut both = page("https://ex.com/1", &[]);
        both.tags.insert("sci_fi".to_string());
        both.tags.insert("horror".to_string());
        let mut one = page("https://ex.com/2", &[]);
        one.tags.insert("sci_fi".to_string());
        store.upsert_node(&both).unwrap();
        store.upsert_node(&one).unwrap();
        store.upsert_node(&page("https://ex.com/3", &[])).unwrap();

        let sci_fi = store.find_by_tags(&["sci_fi"]).unwrap();
        let urls: Vec<_> = sci_fi.iter().map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["https://ex.com/1", "https://ex.com/2"]);
        assert_eq!(sci_fi[0].title, "Title of https://ex.com/1");
        assert!(sci_fi[0].labels.contains("horror"));

        let scary = store.find_by_tags(&["sci_fi", "horror", "sci_fi"]).unwrap();
        assert_eq!(scary.len(), 1);
        assert_eq!(scary[0].url, "https://ex.com/1");
        assert_eq!(
            Some(scary[0].short_id.clone()),
            store.short_id_of("https://ex.com/1").unwrap()
        );

        assert!(store.find_by_tags(&["western"]).unwrap().is_empty());
        assert_eq!(store.find_by_tags(&[]).unwrap().len(), 3);
    }
}

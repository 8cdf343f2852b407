//! Storage module for persisting the story graph
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent page upserts keyed by URL
//! - Choice edges between pages
//! - Frontier (leaf) queries for resumption
//! - Lookups by opaque node id and by tag
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteGraphStore;
pub use traits::{GraphStore, PersistenceError, StorageResult};

use crate::config::{Backend, DatabaseConfig};
use std::collections::BTreeSet;

/// Opens the configured storage backend
///
/// Backend selection happens here, once, at construction time.
pub fn open_store(config: &DatabaseConfig) -> StorageResult<SqliteGraphStore> {
    match config.backend {
        Backend::Sqlite => SqliteGraphStore::open(config),
    }
}

/// Whether an upsert created a new node or rewrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// A node with no outgoing edges, as captured for edge resolution
#[derive(Debug, Clone)]
pub struct LeafRecord {
    pub url: String,
    /// Serialized choice map, decoded by the caller
    pub choices: String,
}

/// A node as listed by a tag search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    /// Opaque public id, stable across re-crawls
    pub short_id: String,
    pub url: String,
    pub title: String,
    pub labels: BTreeSet<String>,
}

/// A choice edge between two pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub parent_url: String,
    pub child_url: String,
    pub choice_text: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_written: u64,
    pub edges_created: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Decodes a serialized choice map
pub fn decode_choices(raw: &str) -> StorageResult<std::collections::BTreeMap<String, String>> {
    Ok(serde_json::from_str(raw)?)
}

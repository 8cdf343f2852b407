//! Storage traits and error types
//!
//! This module defines the capability interface for graph store backends and
//! the associated error type.

use crate::extract::Page;
use crate::storage::{LeafRecord, UpsertOutcome};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid choice map: {0}")]
    ChoiceMap(#[from] serde_json::Error),

    #[error("Invalid stored timestamp '{0}'")]
    Timestamp(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, PersistenceError>;

/// Capability interface of a graph store backend
///
/// A value implementing this trait is one session. Sessions are never shared
/// between concurrent callers; each concurrent unit of work opens its own.
pub trait GraphStore {
    /// Merges a page into the node keyed by its URL, creating it if absent
    ///
    /// Tags become node labels only when the node is created. Scalar fields
    /// and the serialized choice map are always overwritten.
    fn upsert_node(&mut self, page: &Page) -> StorageResult<UpsertOutcome>;

    /// Returns every choice target recorded on nodes with no outgoing edges
    ///
    /// A stored choice map that cannot be decoded fails the whole call.
    fn get_leaf_urls(&self) -> StorageResult<BTreeSet<String>>;

    /// Returns the total node count, or 0 if the query fails
    fn get_node_count(&self) -> u64;

    /// Creates one `Choice` edge from the parent URL to the child URL
    ///
    /// Returns `Ok(false)` without error when either endpoint is missing.
    fn create_edge(&mut self, parent_url: &str, child_url: &str, choice_text: &str)
        -> StorageResult<bool>;

    /// Captures every current leaf together with its serialized choice map
    fn leaf_snapshot(&self) -> StorageResult<Vec<LeafRecord>>;

    /// Releases the session's resources
    fn shutdown(self);
}

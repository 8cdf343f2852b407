//! Storygraph: a branching-narrative graph builder
//!
//! This crate crawls a "choose your own adventure" site and persists it as a
//! directed graph: one node per page, one labeled edge per reader choice.
//! Runs are resumable from the current leaf nodes, and the edge-resolution
//! pass tolerates per-item failures without corrupting the graph.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod resolver;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Storygraph operations
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::PersistenceError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Storygraph operations
pub type Result<T> = std::result::Result<T, StoryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{extract_page, Document, Page};
pub use storage::{GraphStore, PersistenceError, SqliteGraphStore};
pub use url::canonicalize_url;

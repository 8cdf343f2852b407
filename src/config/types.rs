use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Storygraph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
}

/// Storage backends that can hold the story graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
}

/// Graph database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Which backend implementation to construct
    #[serde(default)]
    pub backend: Backend,

    /// Location of the database (a file path, optionally prefixed with `sqlite://`)
    #[serde(rename = "connection-string")]
    pub connection_string: String,

    /// Optional username for backends that authenticate
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for backends that authenticate
    #[serde(default)]
    pub password: Option<String>,
}

impl DatabaseConfig {
    /// Returns the filesystem path of the database file
    pub fn database_path(&self) -> PathBuf {
        let raw = self
            .connection_string
            .strip_prefix("sqlite://")
            .unwrap_or(&self.connection_string);
        PathBuf::from(raw)
    }

    /// Returns true when both username and password are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Page the crawl starts from when the store is empty
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Maximum link-following depth; 0 disables crawling
    #[serde(default)]
    pub depth: u32,

    /// Maximum number of fetches in flight at once
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    /// Number of concurrent edge-resolution workers
    #[serde(rename = "connection-workers", default = "default_connection_workers")]
    pub connection_workers: u32,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

pub(crate) fn default_parallelism() -> u32 {
    2
}

pub(crate) fn default_connection_workers() -> u32 {
    10
}

pub(crate) fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

pub(crate) fn default_request_timeout() -> u64 {
    30
}

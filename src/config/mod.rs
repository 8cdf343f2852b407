//! Configuration module for Storygraph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The resulting [`Config`] is built once at startup and handed to each component.
//!
//! # Example
//!
//! ```no_run
//! use storygraph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.scraper.depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Backend, Config, DatabaseConfig, ScraperConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

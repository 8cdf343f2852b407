//! URL handling module for Storygraph
//!
//! Node identity is the canonical absolute URL of a page, so every URL that
//! reaches the store (seed, fetched page, choice target) goes through
//! [`canonicalize_url`] first.

mod canonical;

pub use canonical::{canonicalize_url, resolve_href};

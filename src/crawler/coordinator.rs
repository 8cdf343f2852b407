//! Crawler coordinator - crawl orchestration logic
//!
//! A crawl run moves through three phases:
//! - SEEDING: an empty store starts from the configured root URL, otherwise
//!   the frontier is every choice target recorded on a current leaf
//! - CRAWLING: the collector fetches the frontier and follows choice links
//!   up to the depth bound, writing each page as it arrives
//! - DONE: the number of pages written is reported to the caller
//!
//! Edges are never created here; that is the connection resolver's job.

use crate::config::Config;
use crate::crawler::collector::{Collector, CollectorStats, DocumentHandler};
use crate::crawler::fetcher::build_http_client;
use crate::extract::{extract_page, Document, Page};
use crate::storage::{GraphStore, SqliteGraphStore, StorageResult, UpsertOutcome};
use crate::StoryError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Summary of one crawl phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlOutcome {
    /// Number of URLs the crawl was seeded with
    pub frontier_size: usize,
    /// Pages successfully written to the store
    pub pages_written: u64,
    /// Pages fetched but dropped because the write failed
    pub write_failures: u64,
    /// Fetch-side counters
    pub collector: CollectorStats,
    /// True when the crawl phase was skipped (depth 0)
    pub skipped: bool,
}

/// Main crawler coordinator structure
pub struct Coordinator<'a> {
    config: &'a Config,
    store: &'a SqliteGraphStore,
}

impl<'a> Coordinator<'a> {
    /// Creates a new coordinator over an opened store
    pub fn new(config: &'a Config, store: &'a SqliteGraphStore) -> Self {
        Self { config, store }
    }

    /// Computes the URLs the next crawl starts from
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - The root URL for an empty store, otherwise the leaf targets
    /// * `Err(StoryError)` - The leaf query failed
    pub fn seed_frontier(&self) -> Result<Vec<String>, StoryError> {
        if self.store.get_node_count() == 0 {
            tracing::info!("Store is empty, seeding from {}", self.config.scraper.root_url);
            return Ok(vec![self.config.scraper.root_url.clone()]);
        }

        let leaf_urls = self.store.get_leaf_urls()?;
        tracing::info!("Found {} leaf targets to resume from", leaf_urls.len());
        Ok(leaf_urls.into_iter().collect())
    }

    /// Runs the crawl phase
    ///
    /// This method:
    /// 1. Skips crawling entirely when the configured depth is 0
    /// 2. Seeds the frontier (root URL or current leaf targets)
    /// 3. Fetches and writes pages until the collector is drained
    /// 4. Reports how many pages were written
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CrawlOutcome, StoryError> {
        let depth = self.config.scraper.depth;
        if depth == 0 {
            tracing::info!("Depth is 0, skipping crawl");
            return Ok(CrawlOutcome {
                skipped: true,
                ..CrawlOutcome::default()
            });
        }

        let frontier = self.seed_frontier()?;
        let client = build_http_client(&self.config.scraper)?;
        let writer = Arc::new(PageWriter::new(self.store.path()));

        let mut collector = Collector::new(
            client,
            depth,
            self.config.scraper.parallelism as usize,
            writer.clone(),
            cancel.clone(),
        );

        tracing::info!(
            "Starting crawl of {} frontier URLs (depth {}, parallelism {})",
            frontier.len(),
            depth,
            self.config.scraper.parallelism
        );
        let start_time = std::time::Instant::now();

        for url in &frontier {
            collector.visit(url);
        }
        let stats = collector.wait().await;

        let outcome = CrawlOutcome {
            frontier_size: frontier.len(),
            pages_written: writer.pages_written(),
            write_failures: writer.write_failures(),
            collector: stats,
            skipped: false,
        };

        tracing::info!(
            "Crawl finished: {} pages written, {} fetch failures, {} write failures in {:?}",
            outcome.pages_written,
            stats.failed,
            outcome.write_failures,
            start_time.elapsed()
        );

        Ok(outcome)
    }
}

/// Computes the frontier a run would start from, without writing to disk
///
/// A database file that does not exist yet is not created; the frontier is
/// then the root URL alone.
pub fn preview_frontier(config: &Config) -> Result<Vec<String>, StoryError> {
    let db_path = config.database.database_path();
    if !db_path.exists() {
        tracing::info!(
            "{} does not exist yet, a run would seed from the root URL",
            db_path.display()
        );
        return Ok(vec![config.scraper.root_url.clone()]);
    }

    let store = SqliteGraphStore::connect(&db_path)?;
    let frontier = Coordinator::new(config, &store).seed_frontier();
    store.shutdown();
    frontier
}

/// Document handler that extracts each page and writes it to the store
///
/// Every write opens its own session so concurrent documents never share a
/// connection.
pub struct PageWriter {
    db_path: PathBuf,
    written: AtomicU64,
    failed: AtomicU64,
}

impl PageWriter {
    /// Creates a writer for the database at `db_path`
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Number of pages written so far
    pub fn pages_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Number of pages dropped because their write failed
    pub fn write_failures(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn write(&self, page: &Page) -> StorageResult<UpsertOutcome> {
        let mut session = SqliteGraphStore::connect(&self.db_path)?;
        let outcome = session.upsert_node(page);
        session.shutdown();
        outcome
    }
}

impl DocumentHandler for PageWriter {
    fn on_document(&self, document: &Document) -> Vec<String> {
        let page = extract_page(document);

        match self.write(&page) {
            Ok(outcome) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "{:?} {} ({} choices)",
                    outcome,
                    page.url,
                    page.choices.len()
                );
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to write page {}: {}", page.url, e);
            }
        }

        page.choice_targets()
    }
}

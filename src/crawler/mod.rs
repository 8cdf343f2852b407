//! Crawler module for page fetching and run orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and content classification
//! - The depth-bounded, parallelism-limited collector
//! - Crawl coordination (seed, crawl, write)
//! - The full run pipeline: crawl followed by connection resolution

mod collector;
mod coordinator;
mod fetcher;

pub use collector::{Collector, CollectorStats, DocumentHandler};
pub use coordinator::{preview_frontier, Coordinator, CrawlOutcome, PageWriter};
pub use fetcher::{build_http_client, fetch_url, FetchResult};

use crate::config::Config;
use crate::resolver::{ConnectionResolver, ResolutionReport};
use crate::storage::{open_store, GraphStore, RunStatus, SqliteGraphStore};
use crate::StoryError;
use tokio_util::sync::CancellationToken;

/// Everything a finished run reports
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub crawl: CrawlOutcome,
    pub resolution: ResolutionReport,
}

/// Runs a complete crawl-and-link operation
///
/// This is the main entry point for a run. It will:
/// 1. Open the graph store (failure here is fatal)
/// 2. Record a new run with the configuration hash
/// 3. Crawl from the root URL or from the current leaves
/// 4. Resolve choice edges for every leaf
/// 5. Record the run's final status and counts
/// 6. Release the store
///
/// A cancelled token stops new work from starting; the run is then
/// recorded as interrupted.
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Fingerprint of the configuration file
/// * `cancel` - Shutdown signal
///
/// # Example
///
/// ```no_run
/// use storygraph::config::load_config_with_hash;
/// use storygraph::crawler::run_pipeline;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let summary = run_pipeline(&config, &hash, CancellationToken::new()).await?;
/// println!("{} pages written", summary.crawl.pages_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_pipeline(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<RunSummary, StoryError> {
    let mut store = open_store(&config.database)?;
    let run_id = store.create_run(config_hash)?;
    tracing::info!(
        "Started run {} on {}",
        run_id,
        config.database.database_path().display()
    );

    let result = crawl_and_resolve(config, &store, &cancel).await;

    let status = match &result {
        Ok(_) if cancel.is_cancelled() => RunStatus::Interrupted,
        Ok(_) => RunStatus::Completed,
        Err(_) => RunStatus::Failed,
    };
    let (pages_written, edges_created) = match &result {
        Ok((crawl, resolution)) => (crawl.pages_written, resolution.edges_created),
        Err(_) => (0, 0),
    };

    if let Err(e) = store.finish_run(run_id, status, pages_written, edges_created) {
        tracing::warn!("Failed to record the end of run {}: {}", run_id, e);
    }
    store.shutdown();

    let (crawl, resolution) = result?;
    tracing::info!(
        "Run {} {}: {} pages written, {} edges created",
        run_id,
        status.to_db_string(),
        pages_written,
        edges_created
    );

    Ok(RunSummary {
        run_id,
        status,
        crawl,
        resolution,
    })
}

async fn crawl_and_resolve(
    config: &Config,
    store: &SqliteGraphStore,
    cancel: &CancellationToken,
) -> Result<(CrawlOutcome, ResolutionReport), StoryError> {
    let crawl = Coordinator::new(config, store).run(cancel).await?;

    let resolution = ConnectionResolver::new(store, config.scraper.connection_workers as usize)
        .resolve(cancel)
        .await?;

    Ok((crawl, resolution))
}

//! Connection resolver
//!
//! After crawling settles, every current leaf is reconnected to the pages its
//! recorded choices point at. The pass works from a single point-in-time
//! snapshot of the leaves, fans the edges out to a fixed pool of blocking
//! workers, and finishes when every worker has been joined.
//!
//! Resolution is best effort: undecodable leaves and failed edges are logged
//! and skipped. Edges are never checked for existence, so overlapping passes
//! can create duplicate edges for the same triple.

mod worker;

pub use worker::EdgeTask;

use crate::storage::{decode_choices, GraphStore, LeafRecord, SqliteGraphStore, StorageResult};
use crate::StoryError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use worker::{run_worker, EdgeQueue, WorkerStats};

/// Aggregated outcome of one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Leaves captured in the snapshot
    pub leaves: u64,
    /// Leaves whose choice map could not be decoded
    pub leaves_skipped: u64,
    /// Edge tasks placed on the queue
    pub edges_queued: u64,
    /// Edges actually created
    pub edges_created: u64,
    /// Tasks whose parent or child was not in the store
    pub missing_endpoints: u64,
    /// Tasks whose edge write failed
    pub failed: u64,
    /// Tasks never attempted (cancellation or no usable session)
    pub unprocessed: u64,
}

impl ResolutionReport {
    fn absorb(&mut self, stats: WorkerStats) {
        self.edges_created += stats.created;
        self.missing_endpoints += stats.missing_endpoints;
        self.failed += stats.failed;
    }
}

/// Flattens leaf choice maps into edge tasks
///
/// Returns the tasks in leaf order and the number of leaves skipped because
/// their choice map did not decode.
pub fn plan_edges(leaves: &[LeafRecord]) -> (VecDeque<EdgeTask>, u64) {
    let mut tasks = VecDeque::new();
    let mut skipped = 0;

    for leaf in leaves {
        let choices = match decode_choices(&leaf.choices) {
            Ok(choices) => choices,
            Err(e) => {
                skipped += 1;
                tracing::warn!("Skipping leaf {}: bad choice map: {}", leaf.url, e);
                continue;
            }
        };

        tasks.extend(choices.into_iter().map(|(choice_text, child_url)| EdgeTask {
            parent_url: leaf.url.clone(),
            choice_text,
            child_url,
        }));
    }

    (tasks, skipped)
}

/// Creates choice edges for every current leaf using a fixed worker pool
pub struct ConnectionResolver<'a> {
    store: &'a SqliteGraphStore,
    workers: usize,
}

impl<'a> ConnectionResolver<'a> {
    /// Creates a resolver with `workers` concurrent sessions
    pub fn new(store: &'a SqliteGraphStore, workers: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
        }
    }

    /// Runs one resolution pass
    ///
    /// # Returns
    ///
    /// * `Ok(ResolutionReport)` - The pass completed (individual failures are counted)
    /// * `Err(StoryError)` - The leaf snapshot could not be read
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<ResolutionReport, StoryError> {
        tracing::info!("Starting connection resolution");

        let leaves = self.store.leaf_snapshot()?;
        let db_path = self.store.path().to_path_buf();
        let report = resolve_leaves(&leaves, self.workers, cancel, move || {
            SqliteGraphStore::connect(&db_path)
        })
        .await;

        Ok(report)
    }
}

/// Resolves a leaf snapshot with at most `workers` sessions open at once
///
/// Every worker opens its own session with `open_session` and releases it
/// when the queue is drained.
pub(crate) async fn resolve_leaves<S, F>(
    leaves: &[LeafRecord],
    workers: usize,
    cancel: &CancellationToken,
    open_session: F,
) -> ResolutionReport
where
    S: GraphStore + 'static,
    F: Fn() -> StorageResult<S> + Send + Sync + 'static,
{
    let (tasks, leaves_skipped) = plan_edges(leaves);

    let mut report = ResolutionReport {
        leaves: leaves.len() as u64,
        leaves_skipped,
        edges_queued: tasks.len() as u64,
        ..ResolutionReport::default()
    };

    tracing::info!(
        "Found {} leaves with {} edges to create",
        report.leaves,
        report.edges_queued
    );

    let pool_size = workers.max(1).min(tasks.len());
    let queue: Arc<EdgeQueue> = Arc::new(Mutex::new(tasks));
    let open_session = Arc::new(open_session);
    let mut pool = JoinSet::new();

    for worker_id in 0..pool_size {
        let queue = Arc::clone(&queue);
        let open_session = Arc::clone(&open_session);
        let cancel = cancel.clone();
        pool.spawn_blocking(move || run_worker(worker_id, open_session.as_ref(), &queue, &cancel));
    }

    while let Some(joined) = pool.join_next().await {
        match joined {
            Ok(stats) => report.absorb(stats),
            Err(e) => tracing::error!("Connection worker ended abnormally: {}", e),
        }
    }

    report.unprocessed = queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .len() as u64;

    tracing::info!(
        "Connection resolution finished: {} created, {} missing endpoints, {} failed, {} unprocessed",
        report.edges_created,
        report.missing_endpoints,
        report.failed,
        report.unprocessed
    );

    report
}

//! Edge-creation workers
//!
//! Each worker owns one store session and pulls tasks from the shared queue
//! until it is empty or the run is cancelled.

use crate::storage::{GraphStore, StorageResult};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// One edge to create: parent URL, the choice text, and the child URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTask {
    pub parent_url: String,
    pub choice_text: String,
    pub child_url: String,
}

/// Work queue shared by all workers, filled before any worker starts
pub(crate) type EdgeQueue = Mutex<VecDeque<EdgeTask>>;

/// Per-worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkerStats {
    pub created: u64,
    pub missing_endpoints: u64,
    pub failed: u64,
}

/// Opens a session and drains the queue with it
///
/// A worker that cannot open a session takes no tasks; its share is left
/// to the other workers.
pub(crate) fn run_worker<S, F>(
    worker_id: usize,
    open_session: &F,
    queue: &EdgeQueue,
    cancel: &CancellationToken,
) -> WorkerStats
where
    S: GraphStore,
    F: Fn() -> StorageResult<S>,
{
    let mut session = match open_session() {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Connection worker {} could not open a session: {}", worker_id, e);
            return WorkerStats::default();
        }
    };

    let stats = drain_queue(worker_id, &mut session, queue, cancel);
    session.shutdown();
    stats
}

/// Creates edges for queued tasks until the queue is empty or cancellation
pub(crate) fn drain_queue<S: GraphStore>(
    worker_id: usize,
    store: &mut S,
    queue: &EdgeQueue,
    cancel: &CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while !cancel.is_cancelled() {
        let Some(task) = next_task(queue) else {
            break;
        };

        match store.create_edge(&task.parent_url, &task.child_url, &task.choice_text) {
            Ok(true) => {
                stats.created += 1;
                tracing::trace!(
                    "Worker {} linked {} -> {}",
                    worker_id,
                    task.parent_url,
                    task.child_url
                );
            }
            Ok(false) => {
                stats.missing_endpoints += 1;
                tracing::debug!(
                    "No edge for '{}' from {} to {}: endpoint not in store",
                    task.choice_text,
                    task.parent_url,
                    task.child_url
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(
                    "Failed to create edge '{}' from {} to {}: {}",
                    task.choice_text,
                    task.parent_url,
                    task.child_url,
                    e
                );
            }
        }
    }

    stats
}

fn next_task(queue: &EdgeQueue) -> Option<EdgeTask> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

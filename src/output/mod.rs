//! Output module for reporting on the stored graph
//!
//! This module handles:
//! - Loading graph statistics (nodes, edges, leaves, latest run)
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, GraphStatistics};

use crate::storage::RunRecord;

/// Computes how long a run took, if it has finished
///
/// Returns `None` for runs still in progress or with unparseable timestamps.
pub fn run_duration_seconds(run: &RunRecord) -> Option<u64> {
    let started = run
        .started_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;

    u64::try_from((finished - started).num_seconds()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RunStatus;

    fn run(started_at: &str, finished_at: Option<&str>) -> RunRecord {
        RunRecord {
            id: 1,
            started_at: started_at.to_string(),
            finished_at: finished_at.map(str::to_string),
            config_hash: "abc".to_string(),
            status: RunStatus::Completed,
            pages_written: 0,
            edges_created: 0,
        }
    }

    #[test]
    fn test_run_duration() {
        let finished = run(
            "2024-05-01T10:00:00+00:00",
            Some("2024-05-01T10:01:30+00:00"),
        );
        assert_eq!(run_duration_seconds(&finished), Some(90));
    }

    #[test]
    fn test_run_duration_unfinished() {
        assert_eq!(
            run_duration_seconds(&run("2024-05-01T10:00:00+00:00", None)),
            None
        );
        assert_eq!(
            run_duration_seconds(&run("yesterday", Some("today"))),
            None
        );
    }
}

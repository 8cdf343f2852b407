//! Statistics generation from the graph database
//!
//! This module provides functionality for extracting and displaying
//! graph statistics from the storage layer.

use crate::output::run_duration_seconds;
use crate::storage::{GraphStore, RunRecord, SqliteGraphStore};
use crate::StoryError;

/// Graph statistics summary
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    /// Total number of page nodes
    pub total_nodes: u64,

    /// Total number of choice edges
    pub total_edges: u64,

    /// Nodes with no outgoing edges
    pub leaf_nodes: u64,

    /// Distinct choice targets recorded on leaves (the next crawl's frontier)
    pub frontier_size: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The graph store to query
///
/// # Returns
///
/// * `Ok(GraphStatistics)` - Successfully loaded statistics
/// * `Err(StoryError)` - Failed to query statistics
pub fn load_statistics(store: &SqliteGraphStore) -> Result<GraphStatistics, StoryError> {
    Ok(GraphStatistics {
        total_nodes: store.get_node_count(),
        total_edges: store.count_edges()?,
        leaf_nodes: store.count_leaves()?,
        frontier_size: store.get_leaf_urls()?.len() as u64,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &GraphStatistics) {
    println!("=== Graph Statistics ===\n");

    println!("Overview:");
    println!("  Pages: {}", stats.total_nodes);
    println!("  Choice edges: {}", stats.total_edges);
    println!("  Leaf pages: {}", stats.leaf_nodes);
    println!("  Frontier URLs: {}", stats.frontier_size);
    println!();

    let linked = stats.total_nodes.saturating_sub(stats.leaf_nodes);
    let linked_rate = if stats.total_nodes > 0 {
        (linked as f64 / stats.total_nodes as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Linked: {:.1}% ({} / {} pages have outgoing choices)",
        linked_rate, linked, stats.total_nodes
    );
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            println!("  Pages written: {}", run.pages_written);
            println!("  Edges created: {}", run.edges_created);
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
}

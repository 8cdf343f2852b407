//! Storygraph main entry point
//!
//! This is the command-line interface for the Storygraph story crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use storygraph::config::{load_config_with_hash, Config};
use storygraph::crawler::{preview_frontier, run_pipeline};
use storygraph::extract::{normalize_tag, TEXT_SEPARATOR};
use storygraph::output::{load_statistics, print_statistics};
use storygraph::storage::{open_store, GraphStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Storygraph: a branching-narrative graph builder
///
/// Storygraph crawls a "choose your own adventure" site, stores every page
/// as a node and every reader choice as an edge. Re-running it resumes from
/// the pages whose choices have not been followed yet.
#[derive(Parser, Debug)]
#[command(name = "storygraph")]
#[command(version)]
#[command(about = "Crawl a branching story into a graph", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the configured crawl depth (0 only resolves edges)
    #[arg(long, value_name = "N")]
    depth: Option<u32>,

    /// Validate config and show the frontier without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Show the stored page with this node id and exit
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats", "tag"])]
    entry: Option<String>,

    /// List stored pages carrying this tag (repeatable; all must match) and exit
    #[arg(long, value_name = "TAG", conflicts_with_all = ["dry_run", "stats"])]
    tag: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(depth) = cli.depth {
        tracing::info!("Depth overridden on the command line: {}", depth);
        config.scraper.depth = depth;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(id) = &cli.entry {
        handle_entry(&config, id)
    } else if !cli.tag.is_empty() {
        handle_tag_search(&config, &cli.tag)
    } else {
        handle_run(&config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("storygraph=info,warn"),
            1 => EnvFilter::new("storygraph=debug,info"),
            2 => EnvFilter::new("storygraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the frontier
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Storygraph Dry Run ===\n");

    println!("Database:");
    println!("  Backend: {:?}", config.database.backend);
    println!("  Path: {}", config.database.database_path().display());
    println!(
        "  Credentials: {}",
        if config.database.has_credentials() {
            "configured (ignored by SQLite)"
        } else {
            "none"
        }
    );

    println!("\nScraper:");
    println!("  Root URL: {}", config.scraper.root_url);
    println!("  Depth: {}", config.scraper.depth);
    println!("  Parallelism: {}", config.scraper.parallelism);
    println!("  Connection workers: {}", config.scraper.connection_workers);
    println!("  User agent: {}", config.scraper.user_agent);
    println!("  Request timeout: {}s", config.scraper.request_timeout_secs);

    let store_exists = config.database.database_path().exists();
    let frontier = preview_frontier(config).context("Failed to read the frontier")?;

    if store_exists {
        println!("\nFrontier ({}):", frontier.len());
    } else {
        println!("\nFrontier ({}, root URL, empty store):", frontier.len());
    }
    for url in &frontier {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
    if config.scraper.depth == 0 {
        println!("✓ Depth is 0: would only resolve edges");
    } else {
        println!("✓ Would start crawling with {} URLs", frontier.len());
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.database_path().display());

    let store = open_store(&config.database).context("Failed to open the graph store")?;
    let stats = load_statistics(&store)?;
    store.shutdown();

    print_statistics(&stats);

    Ok(())
}

/// Handles --entry: prints one stored page and its choices
fn handle_entry(config: &Config, id: &str) -> anyhow::Result<()> {
    let store = open_store(&config.database).context("Failed to open the graph store")?;
    let page = store.get_page_by_id(id);
    store.shutdown();

    let Some(page) = page? else {
        anyhow::bail!("No page with id {}", id);
    };

    println!("{}", page.title);
    println!("  URL: {}", page.url);
    if let Some(author) = &page.author {
        println!("  Author: {}", author);
    }
    if let Some(date) = page.date {
        println!("  Date: {}", date);
    }
    if !page.tags.is_empty() {
        let tags: Vec<&str> = page.tags.iter().map(String::as_str).collect();
        println!("  Tags: {}", tags.join(" "));
    }
    println!("\n{}\n", page.text.replace(TEXT_SEPARATOR, "\n\n"));
    for (choice, target) in &page.choices {
        println!("  {} -> {}", choice, target);
    }

    Ok(())
}

/// Handles --tag: lists stored pages carrying every given tag
fn handle_tag_search(config: &Config, tags: &[String]) -> anyhow::Result<()> {
    let normalized: Vec<String> = tags.iter().map(|tag| normalize_tag(tag)).collect();
    let wanted: Vec<&str> = normalized.iter().map(String::as_str).collect();

    let store = open_store(&config.database).context("Failed to open the graph store")?;
    let nodes = store.find_by_tags(&wanted);
    store.shutdown();
    let nodes = nodes?;

    println!("{} pages tagged {}:", nodes.len(), wanted.join(" + "));
    for node in &nodes {
        let labels: Vec<&str> = node.labels.iter().map(String::as_str).collect();
        println!("  {}  {}  [{}]", node.short_id, node.title, labels.join(" "));
    }

    Ok(())
}

/// Handles the main crawl-and-resolve operation
async fn handle_run(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel.clone()));

    match run_pipeline(config, config_hash, cancel).await {
        Ok(summary) => {
            tracing::info!(
                "Run {} {}: {} pages written, {} edges created ({} missing endpoints, {} failed, {} unprocessed)",
                summary.run_id,
                summary.status.to_db_string(),
                summary.crawl.pages_written,
                summary.resolution.edges_created,
                summary.resolution.missing_endpoints,
                summary.resolution.failed,
                summary.resolution.unprocessed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cancels the token on SIGINT or SIGTERM
async fn wait_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Could not install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    request_shutdown(&cancel);
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_err() {
                    return;
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
    }

    request_shutdown(&cancel);
}

fn request_shutdown(cancel: &CancellationToken) {
    tracing::info!("Shutdown requested, finishing in-flight work");
    cancel.cancel();
}

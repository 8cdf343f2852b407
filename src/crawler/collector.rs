//! Bounded-parallel document collector
//!
//! The collector owns the fetch side of a crawl:
//! - A visited set so each canonical URL is fetched at most once per run
//! - A depth bound: seeds are depth 1, discovered links are parent depth + 1
//! - A semaphore limiting in-flight fetches to the configured parallelism
//! - A per-document callback ([`DocumentHandler`]) that decides which links to follow
//!
//! `scraper::Html` is not `Send`, so every body is parsed and handed to the
//! handler on a blocking task; only owned strings cross task boundaries.

use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::extract::Document;
use crate::url::canonicalize_url;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Callback invoked for every fetched document
pub trait DocumentHandler: Send + Sync {
    /// Processes one document and returns the links that should be visited next
    fn on_document(&self, document: &Document) -> Vec<String>;
}

/// Counters describing what the collector did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Documents fetched and handed to the handler
    pub fetched: u64,
    /// Fetches that ended in an HTTP, network or content-type failure
    pub failed: u64,
    /// Links refused because they were beyond the depth bound
    pub refused_by_depth: u64,
    /// Links dropped because they were already visited
    pub duplicates: u64,
    /// Queued fetches abandoned after cancellation
    pub cancelled: u64,
}

/// How a single fetch task ended
#[derive(Debug)]
enum FetchStatus {
    Fetched(Vec<String>),
    Failed,
    Cancelled,
}

#[derive(Debug)]
struct FetchOutcome {
    depth: u32,
    status: FetchStatus,
}

/// Async fetch engine with depth-bounded link following
pub struct Collector {
    client: Client,
    max_depth: u32,
    semaphore: Arc<Semaphore>,
    handler: Arc<dyn DocumentHandler>,
    cancel: CancellationToken,
    visited: HashSet<String>,
    tasks: JoinSet<FetchOutcome>,
    stats: CollectorStats,
}

impl Collector {
    /// Creates a new collector
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client shared by all fetches
    /// * `max_depth` - Deepest link level that may be fetched (seeds are depth 1)
    /// * `parallelism` - Maximum number of fetches in flight
    /// * `handler` - Callback receiving each fetched document
    /// * `cancel` - Token that stops new fetches from starting
    pub fn new(
        client: Client,
        max_depth: u32,
        parallelism: usize,
        handler: Arc<dyn DocumentHandler>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            max_depth,
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
            handler,
            cancel,
            visited: HashSet::new(),
            tasks: JoinSet::new(),
            stats: CollectorStats::default(),
        }
    }

    /// Queues a seed URL at depth 1
    ///
    /// Returns `true` if a fetch was scheduled.
    pub fn visit(&mut self, url: &str) -> bool {
        self.enqueue(url, 1)
    }

    /// Number of fetches currently queued or in flight
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Drives all fetches to completion, following links returned by the handler
    ///
    /// Returns once nothing is queued or in flight.
    pub async fn wait(&mut self) -> CollectorStats {
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Fetch task ended abnormally: {}", e);
                    self.stats.failed += 1;
                    continue;
                }
            };

            match outcome.status {
                FetchStatus::Fetched(links) => {
                    self.stats.fetched += 1;
                    for link in links {
                        self.enqueue(&link, outcome.depth + 1);
                    }
                }
                FetchStatus::Failed => self.stats.failed += 1,
                FetchStatus::Cancelled => self.stats.cancelled += 1,
            }
        }

        self.stats
    }

    fn enqueue(&mut self, raw_url: &str, depth: u32) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        if depth > self.max_depth {
            self.stats.refused_by_depth += 1;
            tracing::trace!("Not following {} at depth {}", raw_url, depth);
            return false;
        }

        let url = match canonicalize_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping link {}: {}", raw_url, e);
                return false;
            }
        };

        if !self.visited.insert(url.to_string()) {
            self.stats.duplicates += 1;
            return false;
        }

        tracing::debug!("Queued {} at depth {}", url, depth);
        self.tasks.spawn(fetch_document(
            self.client.clone(),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.handler),
            self.cancel.clone(),
            url,
            depth,
        ));
        true
    }
}

async fn fetch_document(
    client: Client,
    semaphore: Arc<Semaphore>,
    handler: Arc<dyn DocumentHandler>,
    cancel: CancellationToken,
    url: Url,
    depth: u32,
) -> FetchOutcome {
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome { depth, status: FetchStatus::Cancelled },
        },
        _ = cancel.cancelled() => return FetchOutcome { depth, status: FetchStatus::Cancelled },
    };

    let result = fetch_url(&client, url.as_str()).await;
    drop(permit);

    let status = match result {
        FetchResult::Success {
            final_url,
            status_code,
            body,
            ..
        } => {
            tracing::debug!("Fetched {} ({}, {} bytes)", url, status_code, body.len());
            if final_url != url.as_str() {
                tracing::debug!("{} redirected to {}", url, final_url);
            }

            let page_url = url.to_string();
            let handled = tokio::task::spawn_blocking(move || {
                let document = Document::parse(url, &body);
                handler.on_document(&document)
            })
            .await;

            match handled {
                Ok(links) => FetchStatus::Fetched(links),
                Err(e) => {
                    tracing::error!("Document handler for {} ended abnormally: {}", page_url, e);
                    FetchStatus::Failed
                }
            }
        }
        FetchResult::ContentMismatch { content_type } => {
            tracing::debug!("Skipping {}: expected HTML, got {}", url, content_type);
            FetchStatus::Failed
        }
        FetchResult::HttpError { status_code } => {
            tracing::warn!("Failed to fetch {}: HTTP {}", url, status_code);
            FetchStatus::Failed
        }
        FetchResult::NetworkError { error } => {
            tracing::warn!("Failed to fetch {}: {}", url, error);
            FetchStatus::Failed
        }
    };

    FetchOutcome { depth, status }
}

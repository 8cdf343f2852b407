//! Integration tests for the crawl-and-link pipeline
//!
//! These tests use wiremock to serve a small branching story and run the
//! full pipeline (crawl, write, resolve) against a temporary database.

use std::path::Path;
use storygraph::config::{Backend, Config, DatabaseConfig, ScraperConfig};
use storygraph::crawler::run_pipeline;
use storygraph::extract::Page;
use storygraph::storage::{GraphStore, RunStatus, SqliteGraphStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted at `root_url`
fn create_test_config(root_url: &str, db_path: &Path, depth: u32) -> Config {
    Config {
        database: DatabaseConfig {
            backend: Backend::Sqlite,
            connection_string: db_path.display().to_string(),
            username: None,
            password: None,
        },
        scraper: ScraperConfig {
            root_url: root_url.to_string(),
            depth,
            parallelism: 2,
            connection_workers: 4,
            user_agent: "TestBot/1.0".to_string(),
            request_timeout_secs: 5,
        },
    }
}

async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=ISO-8859-1")
                .set_body_bytes(html.as_bytes().to_vec()),
        )
        .mount(server)
        .await;
}

/// Serves a root page with two starred choices leading to two end pages
async fn mount_story(server: &MockServer) {
    mount_page(
        server,
        "/docs/000/2.html",
        r#"<html><body>
            <h1>The Crossroads</h1>
            <p>You stand where two roads meet.</p>
            <p>Mon Jan 2 15:04:05 2006</p>
            <address>The Narrator</address>
            <ul>
              <li>* <a href="a.html">Take the left road</a></li>
              <li>* <a href="b.html">Take the right road</a></li>
              <li><a href="/index.html">Back to the index</a></li>
            </ul>
            <p>Last updated</p>
        </body></html>"#,
    )
    .await;

    mount_page(
        server,
        "/docs/000/a.html",
        r#"<html><body><h1>Left</h1><p>A quiet forest.</p></body></html>"#,
    )
    .await;

    mount_page(
        server,
        "/docs/000/b.html",
        r#"<html><body><h1>Right</h1><p>A noisy town.</p></body></html>"#,
    )
    .await;
}

#[tokio::test]
async fn test_fresh_crawl_then_resolution() {
    let mock_server = MockServer::start().await;
    mount_story(&mock_server).await;

    let base_url = mock_server.uri();
    let root_url = format!("{}/docs/000/2.html", base_url);
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("story.db");
    let config = create_test_config(&root_url, &db_path, 3);

    let summary = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.crawl.pages_written, 3);
    assert_eq!(summary.resolution.edges_created, 2);

    let store = SqliteGraphStore::open_path(&db_path).unwrap();
    assert_eq!(store.get_node_count(), 3);

    let root = store.get_page(&root_url).unwrap().unwrap();
    assert_eq!(root.title, "The Crossroads");
    assert_eq!(root.author.as_deref(), Some("The Narrator"));
    assert!(root.date.is_some());
    assert!(root.text.contains("two roads meet"));
    assert!(!root.text.contains("Last updated"));
    assert_eq!(root.choices.len(), 2);

    let edges = store.outgoing_edges(&root_url).unwrap();
    assert_eq!(edges.len(), 2);
    let mut labels: Vec<_> = edges.iter().map(|e| e.choice_text.clone()).collect();
    labels.sort();
    assert_eq!(labels, vec!["* Take the left road", "* Take the right road"]);
    assert!(edges
        .iter()
        .any(|e| e.child_url == format!("{}/docs/000/a.html", base_url)));

    // The two end pages remain leaves without choices
    assert_eq!(store.count_leaves().unwrap(), 2);
    assert!(store.get_leaf_urls().unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_from_leaf() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let leaf_url = format!("{}/story/L.html", base_url);
    let target_url = format!("{}/story/X.html", base_url);

    mount_page(
        &mock_server,
        "/story/X.html",
        r#"<html><body><h1>North</h1><p>Cold wind.</p></body></html>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("story.db");
    {
        let mut store = SqliteGraphStore::open_path(&db_path).unwrap();
        let mut leaf = Page::new(leaf_url.clone());
        leaf.choices
            .insert("go north".to_string(), target_url.clone());
        store.upsert_node(&leaf).unwrap();
        store.shutdown();
    }

    // The root is never fetched when the store already has pages
    let config = create_test_config("http://unused.invalid/", &db_path, 1);
    let summary = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.crawl.frontier_size, 1);
    assert_eq!(summary.crawl.pages_written, 1);
    assert_eq!(summary.resolution.edges_created, 1);

    let store = SqliteGraphStore::open_path(&db_path).unwrap();
    assert_eq!(store.get_node_count(), 2);
    let edges = store.outgoing_edges(&leaf_url).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].child_url, target_url);
    assert_eq!(edges[0].choice_text, "go north");
}

#[tokio::test]
async fn test_shallow_crawl_resumes_on_next_run() {
    let mock_server = MockServer::start().await;
    mount_story(&mock_server).await;

    let root_url = format!("{}/docs/000/2.html", mock_server.uri());
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("story.db");
    let config = create_test_config(&root_url, &db_path, 1);

    // Depth 1 fetches only the root; its children are not yet in the store
    let first = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.crawl.pages_written, 1);
    assert_eq!(first.crawl.collector.refused_by_depth, 2);
    assert_eq!(first.resolution.edges_created, 0);
    assert_eq!(first.resolution.missing_endpoints, 2);

    // The second run starts from the root's recorded choices
    let second = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.crawl.frontier_size, 2);
    assert_eq!(second.crawl.pages_written, 2);
    assert_eq!(second.resolution.edges_created, 2);

    let store = SqliteGraphStore::open_path(&db_path).unwrap();
    assert_eq!(store.get_node_count(), 3);
    assert_eq!(store.count_edges().unwrap(), 2);
}

#[tokio::test]
async fn test_depth_zero_makes_no_requests() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let root_url = format!("{}/docs/000/2.html", mock_server.uri());
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("story.db");
    let config = create_test_config(&root_url, &db_path, 0);

    let summary = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.crawl.skipped);
    assert_eq!(summary.crawl.pages_written, 0);
    assert_eq!(summary.resolution.leaves, 0);

    let store = SqliteGraphStore::open_path(&db_path).unwrap();
    assert_eq!(store.get_node_count(), 0);
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_failed_child_does_not_stop_siblings() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/docs/000/2.html",
        r#"<html><body><h1>Start</h1><ul>
            <li>* <a href="ok.html">Safe path</a></li>
            <li>* <a href="gone.html">Broken path</a></li>
        </ul></body></html>"#,
    )
    .await;
    mount_page(
        &mock_server,
        "/docs/000/ok.html",
        "<html><body><h1>Safe</h1></body></html>",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/docs/000/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let root_url = format!("{}/docs/000/2.html", mock_server.uri());
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("story.db");
    let config = create_test_config(&root_url, &db_path, 2);

    let summary = run_pipeline(&config, "hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.crawl.pages_written, 2);
    assert_eq!(summary.crawl.collector.failed, 1);
    assert_eq!(summary.resolution.edges_created, 1);
    assert_eq!(summary.resolution.missing_endpoints, 1);
    assert_eq!(summary.resolution.failed, 0);

    let store = SqliteGraphStore::open_path(&db_path).unwrap();
    let edges = store.outgoing_edges(&root_url).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].choice_text, "* Safe path");
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock broadcaster feeds and test the
//! full cycle end-to-end: configuration, crawl, persistence and summary.

use filmlist_crawler::config::{parse_config, Config};
use filmlist_crawler::crawler::{CrawlManager, MessageLog};
use filmlist_crawler::output::generate_markdown_summary;
use filmlist_crawler::storage::{load_import, open_store, CatalogueStore, ImportLocation};
use filmlist_crawler::{Catalogue, Film, Source};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_CONFIG: &str = r#"
[crawler]
worker-threads = 2

[crawler.source-defaults]
maximum-units-per-task = 2
maximum-requests-per-second = 200.0
retry-backoff-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "DATABASE"
summary-path = "SUMMARY"

[sources.ard]
seeds = ["SERVER/topics"]

[[sources.ard.discovery]]
kind = "json"
selector = "/items"

[[sources.ard.discovery]]
kind = "json"
selector = "/films"

[sources.ard.detail]
kind = "json"
"#;

/// Creates a configuration crawling the mock server, writing into `dir`
fn create_test_config(server: &MockServer, dir: &Path) -> Config {
    let content = FEED_CONFIG
        .replace("SERVER", &server.uri())
        .replace("DATABASE", &dir.join("films.db").display().to_string())
        .replace("SUMMARY", &dir.join("summary.md").display().to_string());
    parse_config(&content).expect("test config is valid")
}

fn film_record(title: &str) -> String {
    format!(
        r#"{{"title": "{}", "published": "2024-05-04T18:30:00", "duration": 600,
            "urls": {{"normal": "https://cdn.example.com/{}.mp4"}}}}"#,
        title,
        title.replace(' ', "-")
    )
}

/// Mounts a topic index with two topics and three films
async fn mount_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/topics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"items": [{"url": "/topic/news", "topic": "News"}, {"url": "/topic/doku", "topic": "Doku"}]}"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/topic/news"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"films": ["/film/1", "/film/2"]}"#),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/topic/doku"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"films": ["/film/3"]}"#))
        .mount(server)
        .await;

    for n in 2..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/film/{}", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(film_record(&format!("Film {}", n))))
            .mount(server)
            .await;
    }
}

async fn mount_film_one(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/film/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(film_record("Film 1")))
        .mount(server)
        .await;
}

fn titles(catalogue: &Catalogue) -> Vec<String> {
    let mut titles: Vec<String> = catalogue.iter().map(|f| f.title.clone()).collect();
    titles.sort();
    titles
}

async fn requests_to(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == wanted)
        .count()
}

#[tokio::test]
async fn test_full_crawl_single_source() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_film_one(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    let mut manager = CrawlManager::from_config(&config).unwrap();

    let catalogue = manager.run_all().await;

    assert_eq!(titles(catalogue), vec!["Film 1", "Film 2", "Film 3"]);
    let news: Vec<&Film> = catalogue.iter().filter(|f| f.topic == "News").collect();
    assert_eq!(news.len(), 2);

    let stats = manager.statistics();
    assert!(!stats.timed_out);
    assert_eq!(stats.sources.len(), 1);
    assert_eq!(stats.sources[0].source, Source::Ard);
    assert_eq!(stats.sources[0].max, 3);
    assert_eq!(stats.sources[0].actual, 3);
    assert_eq!(stats.sources[0].errors, 0);
}

#[tokio::test]
async fn test_failed_detail_page_is_counted() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    Mock::given(method("GET"))
        .and(path("/film/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    let mut manager = CrawlManager::from_config(&config).unwrap();
    let log = Arc::new(MessageLog::new());
    manager.add_message_listener(log.clone());

    let catalogue = manager.run_all().await;

    assert_eq!(titles(catalogue), vec!["Film 2", "Film 3"]);
    assert_eq!(log.count("document-load-error"), 1);
    assert_eq!(log.count("crawler-finished"), 1);

    let progress = manager.crawler(Source::Ard).unwrap().progress();
    assert_eq!(progress.errors, 1);
    assert_eq!(progress.actual, 3);
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    mount_feed(&server).await;

    // Mounted first, so it answers until exhausted
    Mock::given(method("GET"))
        .and(path("/film/1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_film_one(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path());
    let mut manager = CrawlManager::from_config(&config).unwrap();

    let catalogue = manager.run_all().await;

    assert_eq!(catalogue.len(), 3);
    assert_eq!(requests_to(&server, "/film/1").await, 3);
    assert_eq!(manager.crawler(Source::Ard).unwrap().progress().errors, 0);
}

#[tokio::test]
async fn test_unreachable_source_yields_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());

    // Nothing listens on port 9 (discard)
    config.sources.get_mut("ard").unwrap().seeds = vec!["http://127.0.0.1:9/topics".to_string()];
    let mut manager = CrawlManager::from_config(&config).unwrap();

    let catalogue = manager.run_all().await;

    assert!(catalogue.is_empty());
    assert_eq!(manager.crawler(Source::Ard).unwrap().progress().errors, 1);
}

#[tokio::test]
async fn test_run_persist_and_import() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_film_one(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path());

    // First run: crawl and persist
    let mut first = CrawlManager::from_config(&config).unwrap();
    first.run_all().await;
    let stats = first.statistics();
    let catalogue = first.into_catalogue();

    let db_path = Path::new(&config.output.database_path);
    open_store(db_path)
        .unwrap()
        .save(&catalogue, Some("hash-1"))
        .unwrap();
    generate_markdown_summary(&stats, Path::new(&config.output.summary_path)).unwrap();

    let summary = std::fs::read_to_string(&config.output.summary_path).unwrap();
    assert!(summary.contains("| ARD | 3 | 3 | 3 | 0 |"));

    // Second run: the old list is imported and merged with the new crawl
    let stored = open_store(db_path).unwrap().load().unwrap().unwrap();
    assert_eq!(stored, catalogue);

    let mut second = CrawlManager::from_config(&config).unwrap();
    assert_eq!(second.import_catalogue(&stored), 3);
    let merged = second.run_all().await;

    assert_eq!(merged.len(), 3);
    assert_eq!(second.statistics().imported, 3);
}

#[tokio::test]
async fn test_import_list_from_url() {
    let server = MockServer::start().await;
    mount_feed(&server).await;
    mount_film_one(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, dir.path());

    // A list published elsewhere, holding one film the crawl does not find
    let published = NaiveDate::from_ymd_opt(2023, 12, 24)
        .unwrap()
        .and_hms_opt(20, 15, 0)
        .unwrap();
    let archived: Catalogue = vec![Film::new(
        Source::Ard,
        "Archiv",
        "Film 0",
        published,
        Duration::from_secs(900),
    )]
    .into_iter()
    .collect();
    let remote_db = dir.path().join("remote.db");
    open_store(&remote_db).unwrap().save(&archived, None).unwrap();
    let bytes = std::fs::read(&remote_db).unwrap();

    Mock::given(method("GET"))
        .and(path("/lists/filmlist.db"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(&server)
        .await;

    let location = ImportLocation::parse(&format!("{}/lists/filmlist.db", server.uri())).unwrap();
    let client = filmlist_crawler::crawler::build_http_client(&config.user_agent).unwrap();
    let imported = load_import(&location, &client, &dir.path().join("download.db"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(imported, archived);

    let mut manager = CrawlManager::from_config(&config).unwrap();
    assert_eq!(manager.import_catalogue(&imported), 1);
    let merged = manager.run_all().await;

    assert_eq!(titles(merged), vec!["Film 0", "Film 1", "Film 2", "Film 3"]);
}

#[tokio::test]
async fn test_time_limit_from_config_is_applied() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, dir.path());
    config.crawler.maximum_server_duration_minutes = 90;

    let manager = CrawlManager::from_config(&config).unwrap();

    assert_eq!(manager.budget().worker_threads, 2);
    assert_eq!(manager.budget().time_limit, Some(Duration::from_secs(90 * 60)));
    assert_eq!(manager.sources(), vec![Source::Ard]);
}

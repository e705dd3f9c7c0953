//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use news_harvester::config::load_config_with_hash;
use news_harvester::crawler::{CrawlReport, Crawler, HttpFetcher, RunContext};
use news_harvester::enrich::{GazetteerPlaceExtractor, HtmlSummarizer};
use news_harvester::output::ExportLog;
use news_harvester::pipeline::{CandidateRecord, Collaborators};
use news_harvester::rules::compile;
use news_harvester::state::VisitedStore;
use news_harvester::storage::{ArticleQuery, RunStatus, SqliteSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<html><head><title>Floods</title></head><body>
    <h1>Floods sweep across Spain</h1>
    <span class="byline"></span>
    <span class="author">Jane Doe</span>
    <article>
        <p>Heavy rain hit Spain on Monday.</p>
        <p>Rescue teams from France joined the effort.</p>
    </article>
</body></html>"#;

/// Writes a TOML rule file pointing at the mock server
fn write_config(dir: &Path, base_url: &str, obey_robots: bool) -> PathBuf {
    let content = format!(
        r#"
allowedDomains = ["127.0.0.1"]
startUrls = ["{base}/index"]

[[rules]]
allow = ["/article/"]
deny = ["/article/video"]
follow = true
handler = "parse_item"

[fieldSelectors]
headline = ["h1::text"]
author = ["span.byline::text", "span.author::text"]
text = ["article p::text"]

[crawler]
concurrency = 4
retries = 0
fetchTimeoutSecs = 5
obeyRobots = {obey}
"#,
        base = base_url,
        obey = obey_robots
    );

    let config_path = dir.join("rules.toml");
    std::fs::write(&config_path, content).expect("Failed to write rule file");
    config_path
}

/// Runs one crawl the way the binary wires it
async fn run_crawl(
    config_path: &Path,
    output_dir: &Path,
    visited_path: &Path,
    db_path: &Path,
) -> (CrawlReport, Arc<SqliteSink>) {
    let (config, hash) = load_config_with_hash(config_path).expect("Failed to load config");
    let rules = Arc::new(compile(&config).expect("Failed to compile rules"));

    let visited = Arc::new(VisitedStore::open(visited_path).expect("Failed to open visited store"));
    let sink = Arc::new(SqliteSink::open(db_path).expect("Failed to open database"));
    let export = Arc::new(ExportLog::new(
        output_dir,
        &config.pipeline.export_prefix,
        chrono::Local::now(),
    ));

    let fetcher = Arc::new(HttpFetcher::from_config(&config.crawler).expect("Failed to build client"));
    let collaborators = Collaborators {
        summarizer: Arc::new(HtmlSummarizer::new(fetcher.clone())),
        places: Arc::new(GazetteerPlaceExtractor::new().expect("Failed to build gazetteer")),
        sink: sink.clone(),
    };

    let mut crawler = Crawler::new(
        &config,
        rules,
        fetcher,
        collaborators,
        RunContext::new(visited, export, hash),
    );
    let report = crawler.crawl().await.expect("Crawl failed");
    (report, sink)
}

/// Reads every export file in a directory
fn exported_records(output_dir: &Path) -> Vec<CandidateRecord> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(output_dir).expect("Failed to read output dir") {
        let path = entry.expect("Failed to read entry").path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.starts_with("news_") && name.ends_with(".json") {
            let content = std::fs::read_to_string(&path).expect("Failed to read export");
            let mut parsed: Vec<CandidateRecord> =
                serde_json::from_str(&content).expect("Export is not a JSON array");
            records.append(&mut parsed);
        }
    }
    records
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_end_to_end_single_article() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/index",
        r#"<html><body>
            <a href="/article/1">Floods</a>
            <a href="/external/2">Elsewhere</a>
            <a href="/article/video/3">Video</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_html(&mock_server, "/article/1", ARTICLE.to_string()).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, false);
    let output_dir = dir.path().join("output");
    let visited_path = output_dir.join("visited_urls.txt");

    let (report, sink) =
        run_crawl(&config_path, &output_dir, &visited_path, &dir.path().join("news.db")).await;

    assert_eq!(report.status, Some(RunStatus::Completed));
    assert_eq!(report.enqueued, 2, "only the index and /article/1 are enqueued");
    assert_eq!(report.fetched, 2);
    assert_eq!(report.committed, 1);
    assert_eq!(report.exported, 1);

    let records = exported_records(&output_dir);
    assert_eq!(records.len(), 1);
    let article = &records[0];
    assert_eq!(article.url, format!("{}/article/1", base_url));
    assert_eq!(article.headline, "Floods sweep across Spain");
    assert_eq!(article.author, "Jane Doe");
    assert_eq!(
        article.text,
        "Heavy rain hit Spain on Monday.\n\nRescue teams from France joined the effort."
    );
    assert_eq!(article.countries_mentioned, vec!["Spain", "France"]);

    let visited = VisitedStore::load_all(&visited_path).unwrap();
    assert_eq!(visited.len(), 2);
    assert!(visited.contains(&format!("{}/index", base_url)));
    assert!(visited.contains(&format!("{}/article/1", base_url)));

    assert_eq!(sink.list_all().unwrap(), records);
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/index",
        r#"<a href="/article/1">Floods</a>"#.to_string(),
    )
    .await;
    mount_html(&mock_server, "/article/1", ARTICLE.to_string()).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, false);
    let visited_path = dir.path().join("visited_urls.txt");
    let db_path = dir.path().join("news.db");

    let first_output = dir.path().join("run1");
    let (first, _) = run_crawl(&config_path, &first_output, &visited_path, &db_path).await;
    assert_eq!(first.committed, 1);

    let requests_after_first = mock_server.received_requests().await.unwrap().len();

    let second_output = dir.path().join("run2");
    let (second, sink) = run_crawl(&config_path, &second_output, &visited_path, &db_path).await;

    assert_eq!(
        mock_server.received_requests().await.unwrap().len(),
        requests_after_first,
        "second run must not fetch anything"
    );
    assert_eq!(second.status, Some(RunStatus::Completed));
    assert_eq!(second.fetched, 0);
    assert_eq!(second.enqueued, 0);
    assert!(exported_records(&second_output).is_empty());
    assert_eq!(sink.count_articles().unwrap(), 1);

    let visited_file = std::fs::read_to_string(&visited_path).unwrap();
    assert_eq!(visited_file.lines().count(), 2, "no URL is recorded twice");
}

#[tokio::test]
async fn test_tracking_variants_are_fetched_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/index",
        r#"<a href="/article/1?utm_source=home">Floods</a>
           <a href="/article/1#comments">Comments</a>
           <a href="/article/1">Floods again</a>"#
            .to_string(),
    )
    .await;
    mount_html(&mock_server, "/article/1", ARTICLE.to_string()).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, false);
    let output_dir = dir.path().join("output");

    let (report, _) = run_crawl(
        &config_path,
        &output_dir,
        &dir.path().join("visited_urls.txt"),
        &dir.path().join("news.db"),
    )
    .await;

    assert_eq!(report.fetched, 2);
    assert_eq!(report.committed, 1);
    assert_eq!(report.duplicates, 0);
    assert_eq!(exported_records(&output_dir).len(), 1);
}

#[tokio::test]
async fn test_missing_author_is_dropped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/index",
        r#"<a href="/article/1">Floods</a>"#.to_string(),
    )
    .await;
    mount_html(
        &mock_server,
        "/article/1",
        r#"<html><body>
            <h1>Anonymous report</h1>
            <span class="byline"></span>
            <article><p>Nobody signed this one.</p></article>
        </body></html>"#
            .to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, false);
    let output_dir = dir.path().join("output");
    let visited_path = dir.path().join("visited_urls.txt");

    let (report, sink) =
        run_crawl(&config_path, &output_dir, &visited_path, &dir.path().join("news.db")).await;

    // A dropped item still completes the run and its URL is still visited
    assert_eq!(report.status, Some(RunStatus::Completed));
    assert_eq!(report.extracted, 1);
    assert_eq!(report.committed, 0);
    assert_eq!(report.dropped.get("missing-field:author"), Some(&1));
    assert!(exported_records(&output_dir).is_empty());
    assert_eq!(sink.count_articles().unwrap(), 0);

    let visited = VisitedStore::load_all(&visited_path).unwrap();
    assert!(visited.contains(&format!("{}/article/1", base_url)));
}

#[tokio::test]
async fn test_failed_fetch_is_still_visited() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_html(
        &mock_server,
        "/index",
        r#"<a href="/article/gone">Gone</a>"#.to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/article/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, false);
    let visited_path = dir.path().join("visited_urls.txt");

    let (report, _) = run_crawl(
        &config_path,
        &dir.path().join("output"),
        &visited_path,
        &dir.path().join("news.db"),
    )
    .await;

    assert_eq!(report.fetched, 1);
    assert_eq!(report.fetch_failed, 1);
    assert_eq!(report.extracted, 0);

    let visited = VisitedStore::load_all(&visited_path).unwrap();
    assert!(visited.contains(&format!("{}/article/gone", base_url)));
}

#[tokio::test]
async fn test_robots_disallowed_urls_are_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /article/private"),
        )
        .mount(&mock_server)
        .await;
    mount_html(
        &mock_server,
        "/index",
        r#"<a href="/article/1">Public</a>
           <a href="/article/private/2">Private</a>"#
            .to_string(),
    )
    .await;
    mount_html(&mock_server, "/article/1", ARTICLE.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/article/private/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &base_url, true);
    let visited_path = dir.path().join("visited_urls.txt");

    let (report, _) = run_crawl(
        &config_path,
        &dir.path().join("output"),
        &visited_path,
        &dir.path().join("news.db"),
    )
    .await;

    assert_eq!(report.robots_denied, 1);
    assert_eq!(report.committed, 1);

    let visited = VisitedStore::load_all(&visited_path).unwrap();
    assert!(!visited.contains(&format!("{}/article/private/2", base_url)));
}

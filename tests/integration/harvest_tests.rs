//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small fake site and run the full
//! harvest cycle end-to-end against a temporary save folder.

use grid_harvest::config::{build_config, Config, ConfigFile, ConfigOverrides};
use grid_harvest::crawler::{FetchCache, ReqwestTransport};
use grid_harvest::storage::{EntryStore, MediaKind};
use grid_harvest::{run_harvest, FetchError, HarvestError};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, save_folder: &TempDir) -> Config {
    let mut file = ConfigFile::default();
    file.site.base_url = base_url.to_string();
    file.output.save_folder = save_folder.path().to_path_buf();
    file.crawler.concurrency = 4;
    file.crawler.request_timeout = 5;
    build_config("alice", file, ConfigOverrides::default()).expect("valid test config")
}

/// Renders a listing page; the profile page doubles as batch 0
fn listing_page(count: &str, refs: &[&str], cursor: Option<&str>) -> String {
    let posts: String = refs
        .iter()
        .map(|r| format!(r#"<div class="post"><a href="{}"><img src="/thumb.jpg"></a></div>"#, r))
        .collect();
    let next = cursor
        .map(|c| format!(r#"<li class="stream__item" data-next="{}"></li>"#, c))
        .unwrap_or_default();
    format!(
        r#"<html><body>
           <div class="metaline"><span class="metaline__count">{}</span></div>
           <ul class="stream">{}{}</ul>
           </body></html>"#,
        count, posts, next
    )
}

fn image_page(src: &str) -> String {
    format!(
        r#"<html><body><div class="post">
             <div><div class="media" data-type="pic"></div></div>
             <img class="media__image" src="{}">
             <ul><li class="tagpanel__item"><span>#cats</span></li></ul>
           </div></body></html>"#,
        src
    )
}

fn video_page(source: &str, provider: &str) -> String {
    format!(
        r#"<html><body><div class="post">
             <div><div class="media" data-type="video" data-source="{}"></div></div>
             <i class="media__icon media__icon_{}"></i>
             <a class="js-media-stopcontrol" href="https://coub.com/view/xyz">source</a>
           </div></body></html>"#,
        source, provider
    )
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

async fn mount_bytes(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mounts the two-item fixture: an image and a coub video
async fn mount_fixture(server: &MockServer) {
    let uri = server.uri();
    mount_html(
        server,
        "/user/alice",
        listing_page("2 memes", &["/p/1", "/p/2"], None),
    )
    .await;
    mount_html(server, "/p/1", image_page("/media/img1.png")).await;
    mount_html(
        server,
        "/p/2",
        video_page(&format!("{}/media/vid2.mp4", uri), "coub"),
    )
    .await;
    mount_bytes(server, "/media/img1.png", b"PNG-BYTES").await;
    mount_bytes(server, "/media/vid2.mp4", b"MP4-BYTES").await;
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_full_harvest_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_fixture(&mock_server).await;
    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);
    let paths = config.paths.clone();

    let report = run_harvest(config, false).await.expect("harvest succeeds");

    assert_eq!(report.batches, 1);
    assert_eq!(report.registered, 2);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(
        std::fs::read(paths.media.join("0002-img1.png")).unwrap(),
        b"PNG-BYTES"
    );
    assert_eq!(
        std::fs::read(paths.media.join("0001-vid2.mp4")).unwrap(),
        b"MP4-BYTES"
    );

    let store = EntryStore::open(&paths.database, &paths.media).await;
    let image = store.get("/p/1").unwrap();
    assert!(image.downloaded);
    assert_eq!(image.index, 2);
    assert_eq!(image.kind, Some(MediaKind::Image));
    assert_eq!(image.tags, vec!["cats"]);

    let video = store.get("/p/2").unwrap();
    assert!(video.downloaded);
    assert_eq!(video.index, 1);
    assert_eq!(video.kind, Some(MediaKind::Video));
    assert_eq!(video.media_provider.as_deref(), Some("coub"));
    assert_eq!(
        video.media_provider_location.as_deref(),
        Some("https://coub.com/view/xyz")
    );

    let counts = store.counts();
    assert_eq!(counts.approximate_total, Some(2));
    assert_eq!(counts.next_index, Some(0));
}

#[tokio::test]
async fn test_resume_issues_no_requests() {
    let mock_server = MockServer::start().await;
    mount_fixture(&mock_server).await;
    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);
    let database = config.paths.database.clone();

    run_harvest(config.clone(), false).await.unwrap();
    let snapshot_after_first = std::fs::read(&database).unwrap();
    let requests_after_first = request_count(&mock_server).await;

    let report = run_harvest(config, false).await.unwrap();

    assert_eq!(request_count(&mock_server).await, requests_after_first);
    assert_eq!(std::fs::read(&database).unwrap(), snapshot_after_first);
    assert_eq!(report.registered, 0);
    assert_eq!(report.skipped_cached, 2);
    assert_eq!(report.downloaded, 0);
}

#[tokio::test]
async fn test_truncated_snapshot_rediscovers_everything() {
    let mock_server = MockServer::start().await;
    mount_fixture(&mock_server).await;
    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);
    let paths = config.paths.clone();

    run_harvest(config.clone(), false).await.unwrap();

    // Simulate a crash that left half a snapshot behind
    let full = std::fs::read(&paths.database).unwrap();
    std::fs::write(&paths.database, &full[..full.len() / 2]).unwrap();

    let report = run_harvest(config, false)
        .await
        .expect("a corrupt snapshot must not fail the run");

    assert_eq!(report.registered, 2);
    assert_eq!(report.downloaded, 2);
    let store = EntryStore::open(&paths.database, &paths.media).await;
    assert_eq!(store.len(), 2);
    assert_eq!(store.downloaded_count(), 2);
    assert!(paths.media.join("0002-img1.png").exists());
    assert!(paths.media.join("0001-vid2.mp4").exists());
}

#[tokio::test]
async fn test_fresh_ignores_snapshot() {
    let mock_server = MockServer::start().await;
    mount_fixture(&mock_server).await;
    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);

    run_harvest(config.clone(), false).await.unwrap();
    let before = request_count(&mock_server).await;

    let report = run_harvest(config, true).await.unwrap();

    assert_eq!(report.registered, 2);
    // Pages come from the cache, only the media is fetched again
    assert_eq!(request_count(&mock_server).await, before + 2);
}

#[tokio::test]
async fn test_follows_batch_cursor_with_listing_header() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/user/alice",
        listing_page("2 memes", &["/p/1"], Some("cursor-b")),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/user/alice/timeline/cursor-b"))
        .and(query_param("batch", "3"))
        .and(query_param("mode", "grid"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(
            "",
            &["/p/1", "/p/3"],
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/p/1", image_page("/media/a.png")).await;
    mount_html(&mock_server, "/p/3", image_page("/media/c.png")).await;
    mount_bytes(&mock_server, "/media/a.png", b"A").await;
    mount_bytes(&mock_server, "/media/c.png", b"C").await;

    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);
    let paths = config.paths.clone();

    let report = run_harvest(config, false).await.unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.registered, 2);
    assert!(paths.media.join("0002-a.png").exists());
    assert!(paths.media.join("0001-c.png").exists());

    let store = EntryStore::open(&paths.database, &paths.media).await;
    assert_eq!(store.get("/p/3").unwrap().batch_ref.as_deref(), Some("cursor-b"));
}

#[tokio::test]
async fn test_missing_item_is_retried_next_run() {
    let mock_server = MockServer::start().await;
    mount_html(
        &mock_server,
        "/user/alice",
        listing_page("2 memes", &["/p/1", "/p/gone"], None),
    )
    .await;
    mount_html(&mock_server, "/p/1", image_page("/media/img1.png")).await;
    mount_bytes(&mock_server, "/media/img1.png", b"PNG").await;
    Mock::given(method("GET"))
        .and(path("/p/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);
    let paths = config.paths.clone();

    let first = run_harvest(config.clone(), false).await.unwrap();
    assert_eq!(first.downloaded, 1);
    assert_eq!(first.failed, 1);

    let second = run_harvest(config, false).await.unwrap();
    assert_eq!(second.registered, 1);
    assert_eq!(second.skipped_cached, 1);

    let store = EntryStore::open(&paths.database, &paths.media).await;
    let gone = store.get("/p/gone").unwrap();
    assert!(!gone.downloaded);
    assert_eq!(gone.index, 1);
}

#[tokio::test]
async fn test_unknown_provider_fails_run() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    mount_html(
        &mock_server,
        "/user/alice",
        listing_page("1 meme", &["/p/1"], None),
    )
    .await;
    mount_html(
        &mock_server,
        "/p/1",
        video_page(&format!("{}/media/v.mp4", uri), "some-unknown-cdn"),
    )
    .await;

    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&uri, &save_folder);
    let paths = config.paths.clone();

    let result = run_harvest(config, false).await;

    assert!(matches!(result, Err(HarvestError::Store(_))));
    // The final checkpoint still happened
    let store = EntryStore::open(&paths.database, &paths.media).await;
    assert!(store.get("/p/1").unwrap().is_pending());
}

#[tokio::test]
async fn test_profile_failure_aborts_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/alice"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let save_folder = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &save_folder);

    let result = run_harvest(config, false).await;

    assert!(matches!(
        result,
        Err(HarvestError::Fetch(FetchError::UnexpectedStatus { status: 503, .. }))
    ));
}

#[tokio::test]
async fn test_cache_round_trip_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>42</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &cache_dir);
    let transport = ReqwestTransport::from_config(&config.crawler).unwrap();
    let cache = FetchCache::new(cache_dir.path(), Arc::new(transport));
    let url = config.item_url("/p/42").unwrap();

    let first = cache.fetch_buffered(&url, &[]).await.unwrap();
    let second = cache.fetch_buffered(&url, &[]).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, b"<html>42</html>");
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[tokio::test]
async fn test_server_error_is_not_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/err"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &cache_dir);
    let transport = ReqwestTransport::from_config(&config.crawler).unwrap();
    let cache = FetchCache::new(cache_dir.path(), Arc::new(transport));
    let url = config.item_url("/p/err").unwrap();

    for _ in 0..2 {
        let result = cache.fetch_buffered(&url, &[]).await;
        assert!(matches!(
            result,
            Err(FetchError::UnexpectedStatus { status: 500, .. })
        ));
    }
}

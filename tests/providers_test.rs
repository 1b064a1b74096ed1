//! Fallback stream API tests (legacy and tertiary tiers)

use mockito::{Matcher, Server};
use std::time::Duration;

use limestream::api::{LegacyClient, TertiaryClient};
use limestream::error::ResolveError;
use limestream::models::{MediaRequest, StreamKind};
use limestream::stream::fallback::{LegacyApi, TertiaryApi};

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Legacy API
// =============================================================================

#[tokio::test]
async fn test_legacy_episode_path_and_links() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/api/media/tv/1399/oss=UK3/1/3")
        .match_query(Matcher::UrlEncoded("cookie".into(), "tok-a".into()))
        .with_status(200)
        .with_body(
            r#"{
                "success": true,
                "shareKey": "shareXYZ",
                "versions": [
                    {"size": "2.1 GB", "links": [
                        {"url": "https://cdn.example/e3/1080.mp4", "quality": "1080p"},
                        {"url": "", "quality": "720p"}
                    ]},
                    {"links": [
                        {"url": "https://cdn.example/e3/master.m3u8", "name": "Auto", "size": "n/a"}
                    ]}
                ]
            }"#,
        )
        .create_async()
        .await;

    let client = LegacyClient::new(server.url(), TIMEOUT);
    let streams = client
        .streams(&MediaRequest::episode(1399, 1, 3), "tok-a", "UK3")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(streams.share_token.as_deref(), Some("shareXYZ"));
    assert_eq!(streams.candidates.len(), 2);
    assert_eq!(streams.candidates[0].size_label, "2.1 GB");
    assert_eq!(streams.candidates[0].kind, StreamKind::Progressive);
    assert_eq!(streams.candidates[1].quality, "Auto");
    assert_eq!(streams.candidates[1].kind, StreamKind::Adaptive);
}

#[tokio::test]
async fn test_legacy_unsuccessful_is_not_found() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/api/media/movie/550/oss=USA7")
        .match_query(Matcher::Any)
        .with_body(r#"{"success": false, "error": "Invalid cookie"}"#)
        .create_async()
        .await;

    let client = LegacyClient::new(server.url(), TIMEOUT);
    let result = client.streams(&MediaRequest::movie(550), "bad", "USA7").await;
    assert_eq!(result, Err(ResolveError::NotFound("Invalid cookie".to_string())));
}

#[tokio::test]
async fn test_legacy_status_mapping() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/api/media/movie/1/oss=USA7")
        .match_query(Matcher::Any)
        .with_status(504)
        .create_async()
        .await;
    server
        .mock("GET", "/api/media/movie/2/oss=USA7")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let client = LegacyClient::new(server.url(), TIMEOUT);
    let down = client.streams(&MediaRequest::movie(1), "t", "USA7").await.unwrap_err();
    assert!(down.is_service_down());
    let denied = client.streams(&MediaRequest::movie(2), "t", "USA7").await;
    assert!(matches!(denied, Err(ResolveError::Authentication(_))));
}

// =============================================================================
// Tertiary API
// =============================================================================

#[tokio::test]
async fn test_tertiary_hls_is_adaptive() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/hls/movie/550")
        .match_query(Matcher::UrlEncoded("ui".into(), "tok-a".into()))
        .with_body(r#"{"hls": "https://edge.example/play/550"}"#)
        .create_async()
        .await;

    let client = TertiaryClient::new(server.url(), TIMEOUT);
    let candidate = client.stream(&MediaRequest::movie(550), "tok-a").await.unwrap();

    assert_eq!(candidate.url, "https://edge.example/play/550");
    assert_eq!(candidate.kind, StreamKind::Adaptive);
    assert_eq!(candidate.quality, "Auto");
}

#[tokio::test]
async fn test_tertiary_without_hls_is_not_found() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/hls/tv/1399/2/5")
        .match_query(Matcher::Any)
        .with_body(r#"{"error": "not cached"}"#)
        .create_async()
        .await;

    let client = TertiaryClient::new(server.url(), TIMEOUT);
    let result = client.stream(&MediaRequest::episode(1399, 2, 5), "tok-a").await;
    assert!(matches!(result, Err(ResolveError::NotFound(_))));
}

//! End-to-end stream resolution tests
//!
//! Real provider clients pointed at one mock server, exercising the tier
//! waterfall, credential rotation and share caching together.

use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use std::time::Duration;

use limestream::api::{CatalogClient, LegacyClient, ShareClient, TertiaryClient};
use limestream::error::ResolveError;
use limestream::models::{MediaRequest, StreamKind};
use limestream::store::{MemoryStore, SharedStore};
use limestream::stream::{Orchestrator, ShareTier, Tier};
use limestream::CredentialPool;

const TIMEOUT: Duration = Duration::from_secs(5);

fn orchestrator(server: &ServerGuard) -> Orchestrator {
    let primary = ShareTier::new(
        CatalogClient::new(server.url(), TIMEOUT),
        ShareClient::new(server.url(), TIMEOUT),
    );
    Orchestrator::new(
        Arc::new(LegacyClient::new(server.url(), TIMEOUT)),
        Arc::new(TertiaryClient::new(server.url(), TIMEOUT)),
    )
    .with_primary(Arc::new(primary))
}

/// Accepts connections and never answers, so every request times out
async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

fn store_with_tokens(tokens: &[&str], primary: usize) -> SharedStore {
    let store = MemoryStore::shared();
    store
        .set("credentials", &serde_json::to_string(tokens).unwrap())
        .unwrap();
    store.set("credentials.primary", &primary.to_string()).unwrap();
    store
}

async fn catalog_miss(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/")
        .with_body(r#"{"code": 0, "msg": "no match", "data": []}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_unhealthy_legacy_falls_through_to_tertiary() {
    let mut server = Server::new_async().await;
    catalog_miss(&mut server).await;

    let legacy = server
        .mock("GET", "/api/media/movie/550/oss=USA7")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    server
        .mock("GET", "/hls/movie/550")
        .match_query(Matcher::UrlEncoded("ui".into(), "tok-a".into()))
        .with_body(r#"{"hls": "https://edge.example/550/master.m3u8"}"#)
        .create_async()
        .await;

    let store = store_with_tokens(&["tok-a", "tok-b", "tok-c"], 0);
    let mut pool = CredentialPool::load(store);
    let request = MediaRequest::movie(550).with_external_id("tt0137523");

    let resolution = orchestrator(&server).resolve(&request, &mut pool, None).await;

    legacy.assert_async().await;
    assert!(resolution.is_success());
    assert_eq!(resolution.tier, Some(Tier::Tertiary));
    assert_eq!(resolution.result.kind, Some(StreamKind::Adaptive));
    assert_eq!(
        resolution.result.stream_url.as_deref(),
        Some("https://edge.example/550/master.m3u8")
    );
    // primary miss + one legacy credential
    assert_eq!(resolution.attempts.len(), 2);
    assert_eq!(resolution.attempts[0].tier, Tier::Primary);
    assert_eq!(resolution.attempts[1].credential, Some(0));
    assert_eq!(pool.primary_index(), 0);
}

#[tokio::test]
async fn test_legacy_timeout_falls_through_to_tertiary() {
    let mut server = Server::new_async().await;
    catalog_miss(&mut server).await;
    server
        .mock("GET", "/hls/movie/550")
        .match_query(Matcher::UrlEncoded("ui".into(), "tok-a".into()))
        .with_body(r#"{"hls": "https://edge.example/550/master.m3u8"}"#)
        .create_async()
        .await;

    let legacy_url = silent_server().await;
    let orchestrator = Orchestrator::new(
        Arc::new(LegacyClient::new(legacy_url, Duration::from_millis(300))),
        Arc::new(TertiaryClient::new(server.url(), TIMEOUT)),
    )
    .with_primary(Arc::new(ShareTier::new(
        CatalogClient::new(server.url(), TIMEOUT),
        ShareClient::new(server.url(), TIMEOUT),
    )));

    let mut pool = CredentialPool::load(store_with_tokens(&["tok-a", "tok-b", "tok-c"], 1));
    let request = MediaRequest::movie(550).with_external_id("tt0137523");

    let resolution = orchestrator.resolve(&request, &mut pool, None).await;

    assert_eq!(resolution.tier, Some(Tier::Tertiary));
    // primary miss + the timed-out credential only
    assert_eq!(resolution.attempts.len(), 2);
    assert_eq!(resolution.attempts[1].credential, Some(1));
    assert!(matches!(resolution.attempts[1].error, ResolveError::ServiceUnavailable(_)));
    assert_eq!(pool.primary_index(), 1);
}

#[tokio::test]
async fn test_rejected_credential_rotates_and_promotes() {
    let mut server = Server::new_async().await;
    catalog_miss(&mut server).await;

    server
        .mock("GET", "/api/media/tv/1399/oss=USA7/1/3")
        .match_query(Matcher::UrlEncoded("cookie".into(), "tok-b".into()))
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("GET", "/api/media/tv/1399/oss=USA7/1/3")
        .match_query(Matcher::UrlEncoded("cookie".into(), "tok-c".into()))
        .with_body(
            r#"{"success": true, "shareKey": "freshShare", "versions": [
                {"size": "1 GB", "links": [{"url": "https://cdn.example/e3.mp4?quality=720", "quality": "720p"}]}
            ]}"#,
        )
        .create_async()
        .await;

    let store = store_with_tokens(&["tok-a", "tok-b", "tok-c"], 1);
    let mut pool = CredentialPool::load(store.clone());
    let request = MediaRequest::episode(1399, 1, 3).with_external_id("tt0944947");

    let resolution = orchestrator(&server)
        .resolve(&request, &mut pool, Some("staleShare"))
        .await;

    assert_eq!(resolution.tier, Some(Tier::Secondary));
    assert_eq!(resolution.result.quality.as_deref(), Some("720p"));
    assert!(resolution.share_updated);
    assert_eq!(resolution.result.share_token.as_deref(), Some("freshShare"));
    assert_eq!(pool.primary_index(), 2);
    assert_eq!(store.get("credentials.primary").as_deref(), Some("2"));
}

#[tokio::test]
async fn test_cached_share_skips_catalog_search() {
    let mut server = Server::new_async().await;

    let catalog = server.mock("POST", "/").expect(0).create_async().await;

    server
        .mock("GET", "/file/file_share_list")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("share_key".into(), "cachedShare".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .with_body(
            r#"{"code": 1, "data": {"file_list": [
                {"fid": 1, "file_name": "Movie.2160p.mkv", "file_size_bytes": 9000, "ext": "mkv"},
                {"fid": 2, "file_name": "Movie.720p.mkv", "file_size_bytes": 3000, "ext": "mkv"}
            ]}}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/file/file_share_list")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_body(r#"{"code": 1, "data": {"file_list": []}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/console/video_quality_list")
        .match_query(Matcher::UrlEncoded("fid".into(), "1".into()))
        .with_body(
            r#"{"code": 1, "html": "<div data-url=\"https://cdn.example/1/playlist.m3u8\" data-quality=\"4K\"></div>"}"#,
        )
        .create_async()
        .await;

    let mut pool = CredentialPool::load(store_with_tokens(&["tok-a"], 0));
    let request = MediaRequest::movie(27205);

    let resolution = orchestrator(&server)
        .resolve(&request, &mut pool, Some("https://www.febbox.com/share/cachedShare"))
        .await;

    catalog.assert_async().await;
    assert_eq!(resolution.tier, Some(Tier::Primary));
    assert_eq!(resolution.result.quality.as_deref(), Some("Master (Adaptive)"));
    assert!(!resolution.share_updated);
    assert!(resolution.attempts.is_empty());
}

#[tokio::test]
async fn test_all_tiers_failing() {
    let mut server = Server::new_async().await;
    catalog_miss(&mut server).await;

    server
        .mock("GET", "/api/media/movie/9/oss=USA7")
        .match_query(Matcher::Any)
        .with_body(r#"{"success": false}"#)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/hls/movie/9")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let mut pool = CredentialPool::load(store_with_tokens(&["tok-a", "tok-b"], 0));
    let request = MediaRequest::movie(9).with_external_id("tt0000009");

    let resolution = orchestrator(&server).resolve(&request, &mut pool, None).await;

    assert!(!resolution.is_success());
    assert_eq!(resolution.result.error.as_deref(), Some("All providers failed"));
    assert_eq!(resolution.attempts.len(), 4);
    assert_eq!(resolution.attempts[3].tier, Tier::Tertiary);
}

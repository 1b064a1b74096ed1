//! TMDB (The Movie Database) API client
//!
//! Only the catalog id → industry (IMDB) id translation is used here.
//! API docs: https://developer.themoviedb.org/docs

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::error::ResolveError;
use crate::models::MediaType;
use crate::subtitles::service::ExternalIdResolver;

/// TMDB API error types
#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Rate limited (429), retries exhausted")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

impl From<TmdbError> for ResolveError {
    fn from(err: TmdbError) -> Self {
        match err {
            TmdbError::NotFound => ResolveError::NotFound("title not in metadata catalog".to_string()),
            TmdbError::RateLimited => ResolveError::ServiceUnavailable(err.to_string()),
            TmdbError::ServerError(code) if code >= 500 => ResolveError::ServiceUnavailable(err.to_string()),
            TmdbError::ServerError(401) | TmdbError::ServerError(403) => {
                ResolveError::Authentication("metadata API rejected the key".to_string())
            }
            TmdbError::ServerError(_) => ResolveError::Request(err.to_string()),
            TmdbError::InvalidResponse(msg) => ResolveError::Parse(msg),
            TmdbError::RequestFailed(e) => e.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

/// TMDB API client
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            max_retries: 3,
        }
    }

    /// Make an authenticated GET request with retry logic for rate limits
    async fn get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, TmdbError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut retries = 0;

        loop {
            let response = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Accept", "application/json")
                .send()
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        TmdbError::InvalidResponse(format!("JSON parse error: {}", e))
                    });
                }
                StatusCode::NOT_FOUND => return Err(TmdbError::NotFound),
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries >= self.max_retries {
                        return Err(TmdbError::RateLimited);
                    }

                    let wait_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(2u64.pow(retries));

                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                }
                status => return Err(TmdbError::ServerError(status.as_u16())),
            }
        }
    }

    /// IMDB id of a movie or show, `None` when TMDB has none on record
    pub async fn imdb_id(&self, content_id: u64, media_type: MediaType) -> Result<Option<String>, TmdbError> {
        let ids: ExternalIds = self
            .get(&format!("/{}/{}/external_ids", media_type.as_str(), content_id))
            .await?;
        Ok(ids.imdb_id.filter(|id| !id.trim().is_empty()))
    }
}

#[async_trait]
impl ExternalIdResolver for TmdbClient {
    async fn external_id(&self, content_id: u64, media_type: MediaType) -> Result<String, ResolveError> {
        self.imdb_id(content_id, media_type).await?.ok_or_else(|| {
            ResolveError::NotFound(format!("no IMDB id for {}/{}", media_type.as_str(), content_id))
        })
    }
}

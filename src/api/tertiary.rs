//! Tertiary stream API client (tier 3)
//!
//! Simplified endpoint that answers with a single adaptive playlist.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ResolveError;
use crate::models::{MediaRequest, StreamCandidate, StreamKind};
use crate::stream::fallback::TertiaryApi;

#[derive(Debug, Deserialize)]
struct TertiaryResponse {
    #[serde(default)]
    hls: Option<String>,
}

#[derive(Clone)]
pub struct TertiaryClient {
    base_url: String,
    client: reqwest::Client,
}

impl TertiaryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn media_url(&self, request: &MediaRequest) -> String {
        match request.episode_coords() {
            Some((season, episode)) => format!(
                "{}/hls/tv/{}/{}/{}",
                self.base_url, request.content_id, season, episode
            ),
            None => format!("{}/hls/movie/{}", self.base_url, request.content_id),
        }
    }
}

#[async_trait]
impl TertiaryApi for TertiaryClient {
    async fn stream(&self, request: &MediaRequest, credential: &str) -> Result<StreamCandidate, ResolveError> {
        let response = self
            .client
            .get(self.media_url(request))
            .query(&[("ui", credential)])
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, "tertiary API"));
        }

        let data: TertiaryResponse = serde_json::from_str(&response.text().await?)?;
        let url = data
            .hls
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ResolveError::NotFound("no HLS stream in tertiary response".to_string()))?;

        // Served as a playlist even when the URL has no .m3u8 suffix
        Ok(StreamCandidate {
            url,
            quality: "Auto".to_string(),
            size_label: "Unknown".to_string(),
            kind: StreamKind::Adaptive,
        })
    }
}

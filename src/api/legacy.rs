//! Legacy stream API client (tier 2)
//!
//! Per-credential endpoint keyed by the catalog id. The credential travels as
//! the `cookie` query parameter and the storage region as an `oss=` path
//! segment. Answers with a list of "versions", each carrying direct links.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ResolveError;
use crate::models::{MediaRequest, StreamCandidate};
use crate::stream::fallback::{LegacyApi, LegacyStreams};

/// Legacy API response
#[derive(Debug, Deserialize)]
struct LegacyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    versions: Vec<Version>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, alias = "shareKey")]
    share_key: Option<String>,
}

/// One encode of the title
#[derive(Debug, Deserialize)]
struct Version {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

impl LegacyResponse {
    /// Flatten every usable link into candidates, keeping response order
    fn into_candidates(self) -> Vec<StreamCandidate> {
        self.versions
            .into_iter()
            .flat_map(|version| {
                let version_size = version.size;
                version.links.into_iter().filter_map(move |link| {
                    let url = link.url.filter(|u| !u.is_empty())?;
                    let quality = link
                        .quality
                        .or(link.name)
                        .unwrap_or_else(|| "Unknown".to_string());
                    let size = link
                        .size
                        .or_else(|| version_size.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    Some(StreamCandidate::new(url, quality, size))
                })
            })
            .collect()
    }
}

/// Legacy API client
#[derive(Clone)]
pub struct LegacyClient {
    base_url: String,
    client: reqwest::Client,
}

impl LegacyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn media_url(&self, request: &MediaRequest, region: &str) -> String {
        match request.episode_coords() {
            Some((season, episode)) => format!(
                "{}/api/media/tv/{}/oss={}/{}/{}",
                self.base_url, request.content_id, region, season, episode
            ),
            None => format!(
                "{}/api/media/movie/{}/oss={}",
                self.base_url, request.content_id, region
            ),
        }
    }
}

#[async_trait]
impl LegacyApi for LegacyClient {
    async fn streams(
        &self,
        request: &MediaRequest,
        credential: &str,
        region: &str,
    ) -> Result<LegacyStreams, ResolveError> {
        let url = self.media_url(request, region);
        let response = self
            .client
            .get(&url)
            .query(&[("cookie", credential)])
            .header("User-Agent", "Mozilla/5.0")
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, "legacy API"));
        }

        let data: LegacyResponse = serde_json::from_str(&response.text().await?)?;
        if !data.success || data.versions.is_empty() {
            return Err(ResolveError::NotFound(
                data.error.unwrap_or_else(|| "no streams".to_string()),
            ));
        }

        let share_token = data.share_key.clone().filter(|k| !k.trim().is_empty());
        let candidates = data.into_candidates();
        if candidates.is_empty() {
            return Err(ResolveError::NotFound("no valid stream links".to_string()));
        }

        debug!(request = %request, links = candidates.len(), "legacy API answered");
        Ok(LegacyStreams {
            candidates,
            share_token,
        })
    }
}

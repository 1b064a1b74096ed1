//! Share host client
//!
//! Talks to the file-share host: turns a provider media id into a share
//! token, lists shared folders page by page, fetches share pages and file
//! quality listings, and answers account traffic queries used to validate
//! credentials. Every request carries the `ui` session cookie of the current
//! credential plus the selected storage region.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::api::catalog::ProviderMedia;
use crate::credentials::CredentialValidator;
use crate::error::ResolveError;
use crate::models::{QuotaSnapshot, RemoteFile, DEFAULT_SERVER};
use crate::stream::share::{parse_share_token, ShareSource};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ShareLinkData {
    #[serde(alias = "share_link")]
    link: String,
}

#[derive(Debug, Deserialize)]
struct FileListData {
    #[serde(default)]
    file_list: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    fid: u64,
    file_name: String,
    #[serde(default)]
    file_size_bytes: u64,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    is_dir: u8,
}

impl FileEntry {
    fn into_remote_file(self) -> RemoteFile {
        RemoteFile {
            id: self.fid.to_string(),
            name: self.file_name,
            size_bytes: self.file_size_bytes,
            extension: self.ext,
            is_directory: self.is_dir == 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QualityListResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    html: String,
}

#[derive(Debug, Deserialize)]
struct TrafficData {
    traffic_usage_mb: f64,
    traffic_limit_mb: f64,
    #[serde(default)]
    is_vip: u8,
    #[serde(default)]
    reset_at: Option<String>,
}

/// File-share host client
#[derive(Clone)]
pub struct ShareClient {
    base_url: String,
    client: reqwest::Client,
    session: Option<String>,
    region: String,
}

impl ShareClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            session: None,
            region: DEFAULT_SERVER.to_string(),
        }
    }

    /// Copy of this client bound to a credential and region
    pub fn with_session(&self, credential: Option<&str>, region: &str) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            session: credential.map(str::to_string),
            region: region.to_string(),
        }
    }

    fn cookie(&self) -> String {
        match self.session {
            Some(ref ui) => format!("ui={}; oss_group={}", ui, self.region),
            None => format!("oss_group={}", self.region),
        }
    }

    async fn fetch_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, ResolveError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json, text/javascript, */*; q=0.01")
            .header("Cookie", self.cookie())
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, path));
        }
        Ok(response.text().await?)
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ResolveError> {
        let body = self.fetch_text(path, query).await?;
        if looks_like_html(&body) {
            return Err(ResolveError::Authentication(format!(
                "{} answered with a login page",
                path
            )));
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if envelope.code != 1 {
            return Err(ResolveError::NotFound(
                envelope
                    .msg
                    .unwrap_or_else(|| format!("{} code {}", path, envelope.code)),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ResolveError::Parse(format!("{} returned no data", path)))
    }

    /// Ask the host to publish a share for a provider media id
    pub async fn create_share(&self, media: &ProviderMedia) -> Result<String, ResolveError> {
        let mid = media.id.to_string();
        let box_type = media.box_type.to_string();
        let data: ShareLinkData = self
            .fetch_json(
                "/mbp/to_share_page",
                &[("box_type", box_type.as_str()), ("mid", mid.as_str()), ("json", "1")],
            )
            .await?;

        let token = parse_share_token(&data.link);
        if token.is_empty() {
            return Err(ResolveError::Parse("empty share link".to_string()));
        }
        debug!(media_id = media.id, share = %token, "share created");
        Ok(token)
    }

    /// Query the account's traffic quota for `secret`
    pub async fn traffic(&self, secret: &str) -> Result<QuotaSnapshot, ResolveError> {
        let scoped = self.with_session(Some(secret), &self.region);
        let data: TrafficData = scoped.fetch_json("/console/user_traffic_query", &[]).await?;
        Ok(QuotaSnapshot {
            used_bytes: (data.traffic_usage_mb * BYTES_PER_MB) as u64,
            limit_bytes: (data.traffic_limit_mb * BYTES_PER_MB) as u64,
            resets_at: data.reset_at,
            is_vip: data.is_vip == 1,
        })
    }
}

#[async_trait]
impl ShareSource for ShareClient {
    async fn list_folder(
        &self,
        share: &str,
        parent_id: &str,
        page: u32,
    ) -> Result<Vec<RemoteFile>, ResolveError> {
        let page = page.to_string();
        let data: FileListData = self
            .fetch_json(
                "/file/file_share_list",
                &[
                    ("share_key", share),
                    ("pwd", ""),
                    ("parent_id", parent_id),
                    ("is_html", "0"),
                    ("page", page.as_str()),
                ],
            )
            .await?;
        Ok(data
            .file_list
            .into_iter()
            .map(FileEntry::into_remote_file)
            .collect())
    }

    async fn share_page(&self, share: &str) -> Result<String, ResolveError> {
        self.fetch_text(&format!("/share/{}", share), &[]).await
    }

    async fn quality_listing(&self, share: &str, file_id: &str) -> Result<String, ResolveError> {
        let body = self
            .fetch_text(
                "/console/video_quality_list",
                &[("fid", file_id), ("share_key", share)],
            )
            .await?;
        if looks_like_html(&body) {
            return Err(ResolveError::Authentication(
                "quality listing answered with a login page".to_string(),
            ));
        }
        let parsed: QualityListResponse = serde_json::from_str(&body)?;
        if parsed.code != 1 {
            return Err(ResolveError::NotFound(
                parsed.msg.unwrap_or_else(|| "no quality listing".to_string()),
            ));
        }
        Ok(parsed.html)
    }
}

#[async_trait]
impl CredentialValidator for ShareClient {
    async fn validate(&self, secret: &str) -> Result<QuotaSnapshot, ResolveError> {
        if secret.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("credential is required".to_string()));
        }
        self.traffic(secret.trim()).await
    }
}

fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

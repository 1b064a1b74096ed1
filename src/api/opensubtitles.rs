//! OpenSubtitles REST client
//!
//! Searches by IMDB id + language (+ season/episode) and downloads the raw,
//! gzip-compressed subtitle payload. Decompression and format conversion live
//! in `subtitles::convert`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::ResolveError;
use crate::models::{SubFormat, SubtitleResult};
use crate::subtitles::service::{SubtitleQuery, SubtitleSource};

const USER_AGENT: &str = "LimeTV-v1.0";

/// Search hit as returned by the REST API (every number is a string)
#[derive(Debug, Deserialize)]
struct OsSubtitle {
    #[serde(rename = "SubDownloadLink", default)]
    download_link: String,
    #[serde(rename = "MovieReleaseName", default)]
    release_name: Option<String>,
    #[serde(rename = "MovieName", default)]
    movie_name: String,
    #[serde(rename = "SubLanguageID", default)]
    language: String,
    #[serde(rename = "LanguageName", default)]
    language_name: String,
    #[serde(rename = "SubFormat", default)]
    format: String,
    #[serde(rename = "SubDownloadsCnt", default)]
    downloads: String,
    #[serde(rename = "SubHearingImpaired", default)]
    hearing_impaired: String,
}

impl OsSubtitle {
    fn into_result(self) -> SubtitleResult {
        let release = self
            .release_name
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(self.movie_name);
        SubtitleResult {
            release,
            download_url: self.download_link,
            language: self.language,
            language_name: self.language_name,
            format: SubFormat::from_extension(&self.format),
            downloads: self.downloads.trim().parse().unwrap_or(0),
            hearing_impaired: self.hearing_impaired == "1",
        }
    }
}

/// Search path: `/search/episode-E/imdbid-N/season-S/sublanguageid-L`
pub fn search_path(query: &SubtitleQuery) -> String {
    let mut parts = Vec::new();
    if let Some(episode) = query.episode {
        parts.push(format!("episode-{}", episode));
    }
    parts.push(format!("imdbid-{}", strip_imdb_prefix(&query.external_id)));
    if let Some(season) = query.season {
        parts.push(format!("season-{}", season));
    }
    parts.push(format!("sublanguageid-{}", urlencoding::encode(query.language.trim())));
    format!("/search/{}", parts.join("/"))
}

fn strip_imdb_prefix(imdb_id: &str) -> &str {
    imdb_id.strip_prefix("tt").unwrap_or(imdb_id)
}

pub struct OpenSubtitlesClient {
    base_url: String,
    client: reqwest::Client,
    download_client: reqwest::Client,
}

impl OpenSubtitlesClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, download_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            download_client: reqwest::Client::builder()
                .timeout(download_timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SubtitleSource for OpenSubtitlesClient {
    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleResult>, ResolveError> {
        let url = format!("{}{}", self.base_url, search_path(query));
        let response = self
            .client
            .get(&url)
            .header("X-User-Agent", USER_AGENT)
            .header("Accept", "*/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, "subtitle search"));
        }

        // Anything but an array means "no results"
        let body: serde_json::Value = serde_json::from_str(&response.text().await?)?;
        let results: Vec<SubtitleResult> = match body {
            serde_json::Value::Array(_) => serde_json::from_value::<Vec<OsSubtitle>>(body)?
                .into_iter()
                .map(OsSubtitle::into_result)
                .collect(),
            _ => Vec::new(),
        };

        debug!(path = %search_path(query), results = results.len(), "subtitle search answered");
        Ok(results)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        let response = self.download_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, "subtitle download"));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_path_for_episode() {
        let query = SubtitleQuery {
            external_id: "tt0944947".into(),
            language: "eng".into(),
            season: Some(1),
            episode: Some(3),
        };
        assert_eq!(
            search_path(&query),
            "/search/episode-3/imdbid-0944947/season-1/sublanguageid-eng"
        );
    }

    #[test]
    fn test_search_path_for_movie() {
        let query = SubtitleQuery {
            external_id: "0133093".into(),
            language: "spa".into(),
            season: None,
            episode: None,
        };
        assert_eq!(search_path(&query), "/search/imdbid-0133093/sublanguageid-spa");
    }

    #[test]
    fn test_search_path_encodes_language_list() {
        let query = SubtitleQuery {
            external_id: "tt0133093".into(),
            language: "pob,por".into(),
            season: None,
            episode: None,
        };
        assert_eq!(search_path(&query), "/search/imdbid-0133093/sublanguageid-pob%2Cpor");
    }

    #[test]
    fn test_result_mapping() {
        let raw: OsSubtitle = serde_json::from_str(
            r#"{
                "SubDownloadLink": "https://dl/x.gz",
                "MovieReleaseName": "Show.S01E03.WEB-DL",
                "MovieName": "Show",
                "SubLanguageID": "eng",
                "LanguageName": "English",
                "SubFormat": "ass",
                "SubDownloadsCnt": "12345",
                "SubHearingImpaired": "1"
            }"#,
        )
        .unwrap();
        let result = raw.into_result();
        assert_eq!(result.release, "Show.S01E03.WEB-DL");
        assert_eq!(result.format, SubFormat::Ass);
        assert_eq!(result.downloads, 12345);
        assert!(result.hearing_impaired);
    }
}

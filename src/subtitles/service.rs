//! Subtitle acquisition service
//!
//! Search → rank → pick by index → download → decompress → convert → parse.
//! Remembers, per language and title, which ranked result was served last so
//! "try another" can advance without the caller tracking indices.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::models::{
    MediaRequest, MediaType, SortStrategy, SubtitleCue, SubtitleResult, SubtitleTrackState,
};
use crate::subtitles::{convert, rank};

/// Provider-level search key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleQuery {
    pub external_id: String,
    pub language: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Subtitle search and download backend
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleResult>, ResolveError>;

    /// Raw (usually gzip-compressed) payload
    async fn download(&self, url: &str) -> Result<Vec<u8>, ResolveError>;
}

/// Catalog id → industry id translation
#[async_trait]
pub trait ExternalIdResolver: Send + Sync {
    async fn external_id(&self, content_id: u64, media_type: MediaType) -> Result<String, ResolveError>;
}

/// Caller-level request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleRequest {
    pub media: MediaRequest,
    pub language: String,
}

impl SubtitleRequest {
    pub fn new(media: MediaRequest, language: impl Into<String>) -> Self {
        Self {
            media,
            language: language.into(),
        }
    }

    /// Cycling state is tracked per language and title (and episode)
    fn cycle_key(&self) -> String {
        format!("{}:{}", self.language, self.media)
    }
}

/// A downloaded, converted and parsed subtitle
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSubtitle {
    pub result: SubtitleResult,
    pub srt: String,
    pub cues: Vec<SubtitleCue>,
    pub state: SubtitleTrackState,
}

pub struct SubtitleService {
    source: Arc<dyn SubtitleSource>,
    ids: Option<Arc<dyn ExternalIdResolver>>,
    strategy: SortStrategy,
    cycle: Mutex<HashMap<String, SubtitleTrackState>>,
}

impl SubtitleService {
    pub fn new(source: Arc<dyn SubtitleSource>, strategy: SortStrategy) -> Self {
        Self {
            source,
            ids: None,
            strategy,
            cycle: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_id_resolver(mut self, ids: Arc<dyn ExternalIdResolver>) -> Self {
        self.ids = Some(ids);
        self
    }

    async fn query(&self, request: &SubtitleRequest) -> Result<SubtitleQuery, ResolveError> {
        let media = &request.media;
        let external_id = match (&media.external_id, &self.ids) {
            (Some(id), _) => id.clone(),
            (None, Some(ids)) => ids.external_id(media.content_id, media.media_type).await?,
            (None, None) => {
                return Err(ResolveError::InvalidRequest(
                    "external id required for subtitle search".to_string(),
                ))
            }
        };
        let (season, episode) = match media.episode_coords() {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };
        Ok(SubtitleQuery {
            external_id,
            language: request.language.clone(),
            season,
            episode,
        })
    }

    /// Ranked search results
    pub async fn search(&self, request: &SubtitleRequest) -> Result<Vec<SubtitleResult>, ResolveError> {
        let query = self.query(request).await?;
        let results = self.source.search(&query).await?;
        Ok(rank::rank(results, self.strategy))
    }

    /// Fetch the result at `index` of the ranked list; indices past the end
    /// clamp to the last result
    pub async fn fetch(&self, request: &SubtitleRequest, index: usize) -> Result<LoadedSubtitle, ResolveError> {
        let ranked = self.search(request).await?;
        if ranked.is_empty() {
            return Err(ResolveError::NotFound("No subtitles found for this title".to_string()));
        }

        let current_index = index.min(ranked.len() - 1);
        let state = SubtitleTrackState {
            current_index,
            total_available: ranked.len(),
        };
        let Some(selected) = ranked.into_iter().nth(current_index) else {
            return Err(ResolveError::NotFound("No subtitles found for this title".to_string()));
        };
        if selected.download_url.trim().is_empty() {
            return Err(ResolveError::NotFound("No download link available".to_string()));
        }

        debug!(release = %selected.release, index = current_index, "downloading subtitle");
        let payload = self.source.download(&selected.download_url).await?;
        let srt = convert::payload_to_srt(&payload, selected.format)?;
        let cues = convert::parse_srt(&srt);

        self.cycle.lock().insert(request.cycle_key(), state);
        info!(language = %request.language, track = %state, cues = cues.len(), "subtitle loaded");

        Ok(LoadedSubtitle {
            result: selected,
            srt,
            cues,
            state,
        })
    }

    /// Advance to the next ranked result for this language and title
    pub async fn next(&self, request: &SubtitleRequest) -> Result<LoadedSubtitle, ResolveError> {
        let index = self
            .state(request)
            .map(|state| state.next_index())
            .unwrap_or(0);
        self.fetch(request, index).await
    }

    /// Last served position for this language and title
    pub fn state(&self, request: &SubtitleRequest) -> Option<SubtitleTrackState> {
        self.cycle.lock().get(&request.cycle_key()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubFormat;

    struct FakeSource {
        results: Vec<SubtitleResult>,
        queries: Mutex<Vec<SubtitleQuery>>,
    }

    #[async_trait]
    impl SubtitleSource for FakeSource {
        async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleResult>, ResolveError> {
            self.queries.lock().push(query.clone());
            Ok(self.results.clone())
        }

        async fn download(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
            Ok(format!("1\n00:00:01,000 --> 00:00:02,000\n{}\n", url).into_bytes())
        }
    }

    struct FixedIds;

    #[async_trait]
    impl ExternalIdResolver for FixedIds {
        async fn external_id(&self, _: u64, _: MediaType) -> Result<String, ResolveError> {
            Ok("tt0944947".to_string())
        }
    }

    fn sub(release: &str, url: &str) -> SubtitleResult {
        SubtitleResult {
            release: release.into(),
            download_url: url.into(),
            language: "eng".into(),
            language_name: "English".into(),
            format: SubFormat::Srt,
            downloads: 0,
            hearing_impaired: false,
        }
    }

    fn build(results: Vec<SubtitleResult>) -> (SubtitleService, Arc<FakeSource>) {
        let source = Arc::new(FakeSource {
            results,
            queries: Mutex::new(Vec::new()),
        });
        let service = SubtitleService::new(source.clone(), SortStrategy::Recent)
            .with_id_resolver(Arc::new(FixedIds));
        (service, source)
    }

    #[tokio::test]
    async fn test_cycling_wraps_around() {
        let (service, _) = build(vec![sub("a", "u1"), sub("b", "u2"), sub("c", "u3")]);
        let request = SubtitleRequest::new(MediaRequest::movie(603).with_external_id("tt0133093"), "eng");

        let first = service.next(&request).await.unwrap();
        assert_eq!(first.state.current_index, 0);
        let second = service.next(&request).await.unwrap();
        let third = service.next(&request).await.unwrap();
        let wrapped = service.next(&request).await.unwrap();

        assert_eq!(second.result.release, "b");
        assert_eq!(third.state.to_string(), "3/3");
        assert_eq!(wrapped.state.current_index, 0);
        assert_eq!(wrapped.cues[0].text, "u1");
    }

    #[tokio::test]
    async fn test_cycling_is_per_language() {
        let (service, _) = build(vec![sub("a", "u1"), sub("b", "u2")]);
        let media = MediaRequest::movie(603).with_external_id("tt0133093");
        let eng = SubtitleRequest::new(media.clone(), "eng");
        let spa = SubtitleRequest::new(media, "spa");

        service.next(&eng).await.unwrap();
        service.next(&eng).await.unwrap();
        assert_eq!(service.next(&spa).await.unwrap().state.current_index, 0);
        assert_eq!(service.state(&eng).unwrap().current_index, 1);
    }

    #[tokio::test]
    async fn test_index_past_end_clamps() {
        let (service, _) = build(vec![sub("a", "u1"), sub("b", "u2")]);
        let request = SubtitleRequest::new(MediaRequest::movie(1).with_external_id("tt1"), "eng");
        let loaded = service.fetch(&request, 9).await.unwrap();
        assert_eq!(loaded.result.release, "b");
        assert_eq!(loaded.state.current_index, 1);
    }

    #[tokio::test]
    async fn test_missing_link_and_empty_results() {
        let (service, _) = build(vec![sub("a", "")]);
        let request = SubtitleRequest::new(MediaRequest::movie(1).with_external_id("tt1"), "eng");
        assert!(matches!(service.fetch(&request, 0).await, Err(ResolveError::NotFound(_))));

        let (service, _) = build(Vec::new());
        assert!(matches!(service.next(&request).await, Err(ResolveError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_external_id_translated_for_episode() {
        let (service, source) = build(vec![sub("a", "u1")]);
        let request = SubtitleRequest::new(MediaRequest::episode(1399, 1, 3), "eng");
        service.fetch(&request, 0).await.unwrap();

        let queries = source.queries.lock();
        assert_eq!(queries[0].external_id, "tt0944947");
        assert_eq!(queries[0].season, Some(1));
        assert_eq!(queries[0].episode, Some(3));
    }

    #[tokio::test]
    async fn test_without_resolver_external_id_is_required() {
        let source = Arc::new(FakeSource {
            results: Vec::new(),
            queries: Mutex::new(Vec::new()),
        });
        let service = SubtitleService::new(source, SortStrategy::Smart);
        let request = SubtitleRequest::new(MediaRequest::movie(1), "eng");
        assert!(matches!(service.search(&request).await, Err(ResolveError::InvalidRequest(_))));
    }
}

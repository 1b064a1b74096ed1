//! Share resolver
//!
//! Given a share token, walks the shared folder tree and picks the file to
//! play: the largest video for a movie, or the largest file named like
//! `S01E05` inside the matching "Season N" folder for an episode. A share with
//! an empty root listing is a single-file share; its file id is scraped from
//! the share page instead.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::ResolveError;
use crate::models::{format_bytes, MediaRequest, RemoteFile, StreamCandidate};
use crate::stream::normalize;

/// Pages of a listing searched before giving up
pub const PAGE_BUDGET: u32 = 3;

const ROOT_FOLDER: &str = "0";

static SHARE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/share/([a-zA-Z0-9]+)").expect("valid share regex"));

/// Identifier patterns of a single-file share page, in preference order
static FILE_ID_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r#"data-fid="(\d+)""#, r#"data-id="(\d+)""#, r"fid=(\d+)"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid file id regex"))
        .collect()
});

/// Read access to a share host
#[async_trait]
pub trait ShareSource: Send + Sync {
    /// One page (1-based) of a folder; an empty page ends the listing
    async fn list_folder(
        &self,
        share: &str,
        parent_id: &str,
        page: u32,
    ) -> Result<Vec<RemoteFile>, ResolveError>;

    /// Raw markup of the public share page
    async fn share_page(&self, share: &str) -> Result<String, ResolveError>;

    /// HTML fragment listing the qualities/links of one file
    async fn quality_listing(&self, share: &str, file_id: &str) -> Result<String, ResolveError>;
}

/// What to look for inside a share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareTarget {
    Movie,
    Episode { season: u32, episode: u32 },
}

impl ShareTarget {
    pub fn for_request(request: &MediaRequest) -> Self {
        match request.episode_coords() {
            Some((season, episode)) => ShareTarget::Episode { season, episode },
            None => ShareTarget::Movie,
        }
    }
}

/// Outcome of a successful share resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedShare {
    pub best: StreamCandidate,
    /// Every link of the chosen file's quality listing
    pub candidates: Vec<StreamCandidate>,
    /// Chosen file; `None` for single-file shares
    pub file: Option<RemoteFile>,
}

/// Extract the token from a pasted share URL; raw tokens pass through
pub fn parse_share_token(input: &str) -> String {
    let input = input.trim();
    SHARE_URL_REGEX
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| input.to_string())
}

/// Whether a folder name denotes `season`
pub fn matches_season(name: &str, season: u32) -> bool {
    Regex::new(&format!(r"(?i)season\s*0*{}\b", season))
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

/// Episode number of a file named for `season`, e.g. `Show.S02E07.mkv` → 7
pub fn episode_number(name: &str, season: u32) -> Option<u32> {
    let re = Regex::new(&format!(r"(?i)S0*{}E0*(\d+)", season)).ok()?;
    re.captures(name)?.get(1)?.as_str().parse().ok()
}

/// File id scraped from a single-file share page
pub fn scrape_file_id(html: &str) -> Option<String> {
    FILE_ID_REGEXES
        .iter()
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
}

/// Largest non-directory entry
fn largest_file<'a>(files: impl IntoIterator<Item = &'a RemoteFile>) -> Option<&'a RemoteFile> {
    files
        .into_iter()
        .filter(|f| !f.is_directory)
        .max_by_key(|f| f.size_bytes)
}

/// Walks a share through any `ShareSource`
pub struct ShareResolver<'a> {
    source: &'a dyn ShareSource,
    page_budget: u32,
}

impl<'a> ShareResolver<'a> {
    pub fn new(source: &'a dyn ShareSource) -> Self {
        Self {
            source,
            page_budget: PAGE_BUDGET,
        }
    }

    pub fn with_page_budget(mut self, pages: u32) -> Self {
        self.page_budget = pages.max(1);
        self
    }

    /// Locate the target file and normalize its quality listing
    pub async fn resolve(&self, share: &str, target: ShareTarget) -> Result<ResolvedShare, ResolveError> {
        let first_page = self.source.list_folder(share, ROOT_FOLDER, 1).await?;

        let file = if first_page.is_empty() {
            None
        } else {
            Some(self.locate(share, target, first_page).await?)
        };

        let file_id = match file {
            Some(ref f) => f.id.clone(),
            None => {
                let page = self.source.share_page(share).await?;
                scrape_file_id(&page).ok_or_else(|| {
                    ResolveError::NotFound(format!("share {} exposes no file id", share))
                })?
            }
        };

        debug!(share, file_id = %file_id, "fetching quality listing");
        let listing = self.source.quality_listing(share, &file_id).await?;
        let mut best = normalize::normalize_listing(&listing)?;
        if best.size_label == normalize::UNKNOWN_LABEL {
            if let Some(ref f) = file {
                best.size_label = format_bytes(f.size_bytes);
            }
        }

        Ok(ResolvedShare {
            best,
            candidates: normalize::parse_listing(&listing),
            file,
        })
    }

    async fn locate(
        &self,
        share: &str,
        target: ShareTarget,
        first_page: Vec<RemoteFile>,
    ) -> Result<RemoteFile, ResolveError> {
        match target {
            ShareTarget::Movie => {
                let root = self.collect(share, ROOT_FOLDER, Some(first_page)).await?;
                largest_file(&root).cloned().ok_or_else(|| {
                    ResolveError::NotFound(format!("share {} holds no video files", share))
                })
            }
            ShareTarget::Episode { season, episode } => {
                let folder = self.find_season_folder(share, season, first_page).await?;
                let files = self.collect(share, &folder.id, None).await?;
                let matching = files
                    .iter()
                    .filter(|f| episode_number(&f.name, season) == Some(episode));
                largest_file(matching).cloned().ok_or_else(|| {
                    ResolveError::NotFound(format!(
                        "no S{:02}E{:02} file in '{}'",
                        season, episode, folder.name
                    ))
                })
            }
        }
    }

    /// Search the root listing page by page for the season's folder
    async fn find_season_folder(
        &self,
        share: &str,
        season: u32,
        first_page: Vec<RemoteFile>,
    ) -> Result<RemoteFile, ResolveError> {
        let mut page_entries = first_page;
        for page in 1..=self.page_budget {
            if page > 1 {
                page_entries = self.source.list_folder(share, ROOT_FOLDER, page).await?;
                if page_entries.is_empty() {
                    break;
                }
            }
            if let Some(folder) = page_entries
                .iter()
                .find(|f| f.is_directory && matches_season(&f.name, season))
            {
                debug!(share, season, folder = %folder.name, page, "season folder found");
                return Ok(folder.clone());
            }
        }
        Err(ResolveError::NotFound(format!(
            "no season {} folder in share {}",
            season, share
        )))
    }

    /// Every entry of a folder within the page budget
    async fn collect(
        &self,
        share: &str,
        parent_id: &str,
        first_page: Option<Vec<RemoteFile>>,
    ) -> Result<Vec<RemoteFile>, ResolveError> {
        let mut entries = Vec::new();
        let mut prefetched = first_page;
        for page in 1..=self.page_budget {
            let batch = match prefetched.take() {
                Some(batch) if page == 1 => batch,
                _ => self.source.list_folder(share, parent_id, page).await?,
            };
            if batch.is_empty() {
                break;
            }
            entries.extend(batch);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dir(id: &str, name: &str) -> RemoteFile {
        RemoteFile {
            id: id.into(),
            name: name.into(),
            size_bytes: 0,
            extension: String::new(),
            is_directory: true,
        }
    }

    fn file(id: &str, name: &str, size: u64) -> RemoteFile {
        RemoteFile {
            id: id.into(),
            name: name.into(),
            size_bytes: size,
            extension: "mkv".into(),
            is_directory: false,
        }
    }

    /// In-memory share: (folder, page) → entries; listings keyed by file id
    #[derive(Default)]
    struct FakeShare {
        pages: HashMap<(String, u32), Vec<RemoteFile>>,
        page_html: String,
        listings: HashMap<String, String>,
        list_calls: AtomicUsize,
    }

    impl FakeShare {
        fn page(mut self, folder: &str, page: u32, entries: Vec<RemoteFile>) -> Self {
            self.pages.insert((folder.to_string(), page), entries);
            self
        }

        fn listing(mut self, file_id: &str, url: &str) -> Self {
            self.listings.insert(
                file_id.to_string(),
                format!(r#"<div data-url="{}" data-quality="ORG"></div>"#, url),
            );
            self
        }
    }

    #[async_trait]
    impl ShareSource for FakeShare {
        async fn list_folder(&self, _: &str, parent_id: &str, page: u32) -> Result<Vec<RemoteFile>, ResolveError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .pages
                .get(&(parent_id.to_string(), page))
                .cloned()
                .unwrap_or_default())
        }

        async fn share_page(&self, _: &str) -> Result<String, ResolveError> {
            Ok(self.page_html.clone())
        }

        async fn quality_listing(&self, _: &str, file_id: &str) -> Result<String, ResolveError> {
            self.listings
                .get(file_id)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(file_id.to_string()))
        }
    }

    #[test]
    fn test_parse_share_token() {
        assert_eq!(parse_share_token("https://www.febbox.com/share/AbC123"), "AbC123");
        assert_eq!(parse_share_token("  AbC123 \n"), "AbC123");
        assert_eq!(parse_share_token("https://host/share/xyz?from=app"), "xyz");
    }

    #[test]
    fn test_season_folder_matching() {
        assert!(matches_season("Season 01", 1));
        assert!(matches_season("Season 2", 2));
        assert!(matches_season("SEASON02 [1080p]", 2));
        assert!(!matches_season("Season 12", 2));
        assert!(!matches_season("Season 10", 1));
        assert!(!matches_season("Specials", 1));
    }

    #[test]
    fn test_episode_number() {
        assert_eq!(episode_number("Show.S01E05.1080p.mkv", 1), Some(5));
        assert_eq!(episode_number("show.s2e10.mp4", 2), Some(10));
        assert_eq!(episode_number("Show.S11E02.mkv", 1), None);
        assert_eq!(episode_number("Extras.mkv", 1), None);
    }

    #[test]
    fn test_scrape_file_id_pattern_order() {
        assert_eq!(scrape_file_id(r#"<div data-fid="42" data-id="7">"#).as_deref(), Some("42"));
        assert_eq!(scrape_file_id(r#"<a data-id="7">"#).as_deref(), Some("7"));
        assert_eq!(scrape_file_id("/file?fid=99&x=1").as_deref(), Some("99"));
        assert!(scrape_file_id("<p>nothing</p>").is_none());
    }

    #[tokio::test]
    async fn test_movie_picks_largest_file() {
        let source = FakeShare::default()
            .page("0", 1, vec![file("1", "movie.720p.mp4", 1_000), dir("2", "extras"), file("3", "movie.2160p.mkv", 9_000)])
            .listing("3", "https://cdn/big.mkv");

        let resolved = ShareResolver::new(&source).resolve("tok", ShareTarget::Movie).await.unwrap();
        assert_eq!(resolved.file.unwrap().id, "3");
        assert_eq!(resolved.best.url, "https://cdn/big.mkv");
        assert_eq!(resolved.best.quality, normalize::ORIGINAL_LABEL);
    }

    #[tokio::test]
    async fn test_episode_in_second_page_season_folder() {
        let source = FakeShare::default()
            .page("0", 1, vec![dir("s1", "Season 01")])
            .page("0", 2, vec![dir("s2", "Season 2")])
            .page("s2", 1, vec![
                file("e1", "Show.S02E01.mkv", 500),
                file("e3a", "Show.S02E03.720p.mkv", 700),
                file("e3b", "Show.S02E03.1080p.mkv", 1_400),
            ])
            .listing("e3b", "https://cdn/hls/e3/index.m3u8?quality=1080");

        let resolved = ShareResolver::new(&source)
            .resolve("tok", ShareTarget::Episode { season: 2, episode: 3 })
            .await
            .unwrap();
        assert_eq!(resolved.file.unwrap().id, "e3b");
        assert_eq!(resolved.best.url, "https://cdn/hls/e3/index.m3u8");
        assert_eq!(resolved.best.quality, normalize::MASTER_LABEL);
        assert_eq!(resolved.best.size_label, format_bytes(1_400));
    }

    #[tokio::test]
    async fn test_season_search_respects_page_budget() {
        let source = FakeShare::default()
            .page("0", 1, vec![dir("a", "Season 1")])
            .page("0", 2, vec![dir("b", "Season 2")])
            .page("0", 3, vec![dir("c", "Season 3")])
            .page("0", 4, vec![dir("d", "Season 4")]);

        let err = ShareResolver::new(&source)
            .resolve("tok", ShareTarget::Episode { season: 4, episode: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wider_page_budget_reaches_later_seasons() {
        let source = FakeShare::default()
            .page("0", 1, vec![dir("a", "Season 1")])
            .page("0", 2, vec![dir("b", "Season 2")])
            .page("0", 3, vec![dir("c", "Season 3")])
            .page("0", 4, vec![dir("d", "Season 4")])
            .page("d", 1, vec![file("e1", "Show.S04E01.mkv", 20)])
            .listing("e1", "https://cdn/e1.mp4?quality=720");

        let resolved = ShareResolver::new(&source)
            .with_page_budget(4)
            .resolve("tok", ShareTarget::Episode { season: 4, episode: 1 })
            .await
            .unwrap();
        assert_eq!(resolved.file.unwrap().id, "e1");
    }

    #[tokio::test]
    async fn test_missing_episode_is_not_found() {
        let source = FakeShare::default()
            .page("0", 1, vec![dir("s1", "Season 1")])
            .page("s1", 1, vec![file("e1", "Show.S01E01.mkv", 10)]);

        let err = ShareResolver::new(&source)
            .resolve("tok", ShareTarget::Episode { season: 1, episode: 9 })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_folder_of_directories_has_no_video() {
        let source = FakeShare::default().page("0", 1, vec![dir("x", "Season 1")]);
        let err = ShareResolver::new(&source).resolve("tok", ShareTarget::Movie).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_single_file_share_scrapes_page() {
        let source = FakeShare {
            page_html: r#"<div class="file" data-id="555"></div>"#.to_string(),
            ..Default::default()
        }
        .listing("555", "https://cdn/single.mp4");

        let resolved = ShareResolver::new(&source).resolve("tok", ShareTarget::Movie).await.unwrap();
        assert!(resolved.file.is_none());
        assert_eq!(resolved.best.url, "https://cdn/single.mp4");
        assert_eq!(resolved.candidates.len(), 1);
    }
}

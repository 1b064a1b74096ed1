//! Stream normalizer
//!
//! Turns a provider's quality/link listing into one canonical candidate.
//! Adaptive playlists win and lose their `quality=` pin so the player gets the
//! whole bitrate ladder; otherwise the "original" rendition is used.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::ResolveError;
use crate::models::{StreamCandidate, StreamKind};

pub const MASTER_LABEL: &str = "Master (Adaptive)";
pub const ORIGINAL_LABEL: &str = "Original";
pub const UNKNOWN_LABEL: &str = "Unknown";

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid url regex"));

static DATA_URL_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[^>]*\bdata-url\s*=\s*"[^"]*"[^>]*>"#).expect("valid tag regex")
});

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w-]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex"));

/// Best candidate from an HTML quality listing
pub fn normalize_listing(html: &str) -> Result<StreamCandidate, ResolveError> {
    if let Some(url) = first_adaptive_url(html) {
        return Ok(master_candidate(&url, UNKNOWN_LABEL));
    }

    if let Some(candidate) = parse_listing(html)
        .into_iter()
        .find(|c| is_original_marker(&c.quality))
    {
        return Ok(StreamCandidate {
            quality: ORIGINAL_LABEL.to_string(),
            kind: StreamKind::Progressive,
            ..candidate
        });
    }

    Err(ResolveError::NotFound(
        "quality listing has no adaptive or original stream".to_string(),
    ))
}

/// First URL in the fragment that classifies as an adaptive playlist
pub fn first_adaptive_url(html: &str) -> Option<String> {
    URL_REGEX
        .find_iter(html)
        .map(|m| decode_entities(m.as_str()))
        .find(|url| StreamKind::classify(url) == StreamKind::Adaptive)
}

/// Every `data-url` element of the listing, in document order
pub fn parse_listing(html: &str) -> Vec<StreamCandidate> {
    DATA_URL_TAG_REGEX
        .find_iter(html)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let url = attribute(tag, "data-url").filter(|u| !u.is_empty())?;
            let quality = attribute(tag, "data-quality").unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            let size = attribute(tag, "data-size").unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            Some(StreamCandidate::new(url, quality, size))
        })
        .collect()
}

/// Preferred candidate: highest `StreamKind::rank`, earliest on ties
pub fn pick_best(candidates: &[StreamCandidate]) -> Option<StreamCandidate> {
    // max_by_key keeps the last maximum, so walk backwards
    let best = candidates.iter().rev().max_by_key(|c| c.kind.rank())?;

    if best.kind == StreamKind::Adaptive {
        Some(master_candidate(&best.url, &best.size_label))
    } else {
        Some(best.clone())
    }
}

/// Drop every `quality` query parameter; unparsable URLs pass through
pub fn strip_quality_param(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "quality")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

fn master_candidate(url: &str, size_label: &str) -> StreamCandidate {
    StreamCandidate {
        url: strip_quality_param(url),
        quality: MASTER_LABEL.to_string(),
        size_label: size_label.to_string(),
        kind: StreamKind::Adaptive,
    }
}

fn is_original_marker(quality: &str) -> bool {
    let q = quality.trim().to_lowercase();
    q == "org" || q.contains("original")
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTRIBUTE_REGEX
        .captures_iter(tag)
        .find(|c| c[1].eq_ignore_ascii_case(name))
        .map(|c| decode_entities(&c[2]))
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
}

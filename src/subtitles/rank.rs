//! Subtitle ranking
//!
//! `smart` favours subtitles timed against streaming-service releases, since
//! those match the streams this crate resolves; broadcast captures are
//! pushed to the bottom.

use std::cmp::Ordering;

use crate::models::{SortStrategy, SubtitleResult};

/// (tag, bonus) pairs; every matching tag adds its bonus
const SOURCE_TAGS: &[(&str, f64)] = &[
    ("web-dl", 100.0),
    ("webrip", 90.0),
    ("web.", 85.0),
];

const STREAMING_SERVICE_TAGS: &[&str] = &["amzn", "nf", "dsnp"];
const STREAMING_SERVICE_BONUS: f64 = 80.0;

const DISC_TAGS: &[&str] = &["bluray", "brrip", "bdrip"];
const DISC_BONUS: f64 = 70.0;
const DVD_BONUS: f64 = 60.0;
const BROADCAST_PENALTY: f64 = -100.0;

const DOWNLOADS_PER_POINT: f64 = 10_000.0;
const MAX_DOWNLOAD_POINTS: f64 = 30.0;
const CAPTION_BONUS: f64 = 5.0;

/// Compatibility score of a release name plus popularity
pub fn smart_score(result: &SubtitleResult) -> f64 {
    let name = result.release.to_lowercase();
    let mut score = 0.0;

    for (tag, bonus) in SOURCE_TAGS {
        if name.contains(tag) {
            score += bonus;
        }
    }

    // "nf" is too short for a substring match ("infinity", "conference")
    let tokens: Vec<&str> = name.split(|c: char| !c.is_ascii_alphanumeric()).collect();
    if STREAMING_SERVICE_TAGS.iter().any(|tag| {
        if tag.len() <= 2 {
            tokens.contains(tag)
        } else {
            name.contains(tag)
        }
    }) {
        score += STREAMING_SERVICE_BONUS;
    }

    if DISC_TAGS.iter().any(|tag| name.contains(tag)) {
        score += DISC_BONUS;
    }
    if name.contains("dvdrip") {
        score += DVD_BONUS;
    }
    if name.contains("hdtv") {
        score += BROADCAST_PENALTY;
    }

    score += (result.downloads as f64 / DOWNLOADS_PER_POINT).min(MAX_DOWNLOAD_POINTS);

    if name.contains(".hi.") || name.contains(".cc.") {
        score += CAPTION_BONUS;
    }
    score
}

/// Order results by strategy; ties keep provider order
pub fn rank(mut results: Vec<SubtitleResult>, strategy: SortStrategy) -> Vec<SubtitleResult> {
    match strategy {
        SortStrategy::Recent => {}
        SortStrategy::Popular => results.sort_by(|a, b| b.downloads.cmp(&a.downloads)),
        SortStrategy::Smart => results.sort_by(|a, b| {
            smart_score(b)
                .partial_cmp(&smart_score(a))
                .unwrap_or(Ordering::Equal)
        }),
    }
    results
}

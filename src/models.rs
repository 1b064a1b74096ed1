//! Data structures and types for limestream
//!
//! Contains all shared models used across the crate organized by domain:
//! - **Requests**: what the caller wants to play
//! - **Credentials**: user-supplied provider secrets and quota data
//! - **Streams**: remote files, stream candidates and tier results
//! - **Subtitles**: search results, cues and per-language cycling state
//! - **Progress**: continue-watching entries
//! - **Preferences**: subtitle languages, styling and provider regions

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

// =============================================================================
// Request Models
// =============================================================================

/// Media type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Path segment used by every provider API
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// A title (or one episode of it) to locate a stream for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    /// Catalog (TMDB) id
    pub content_id: u64,
    /// Industry (IMDB) id, required by the primary tier
    pub external_id: Option<String>,
    pub media_type: MediaType,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaRequest {
    pub fn movie(content_id: u64) -> Self {
        Self {
            content_id,
            external_id: None,
            media_type: MediaType::Movie,
            season: None,
            episode: None,
        }
    }

    pub fn episode(content_id: u64, season: u32, episode: u32) -> Self {
        Self {
            content_id,
            external_id: None,
            media_type: MediaType::Tv,
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Season and episode, present only for a complete TV request
    pub fn episode_coords(&self) -> Option<(u32, u32)> {
        match (self.media_type, self.season, self.episode) {
            (MediaType::Tv, Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    /// TV requests must name both season and episode
    pub fn is_complete(&self) -> bool {
        self.media_type == MediaType::Movie || self.episode_coords().is_some()
    }

    /// Cache key for the share token of this title (per season for TV)
    pub fn share_cache_key(&self) -> String {
        match (self.media_type, self.season) {
            (MediaType::Tv, Some(season)) => {
                format!("share:{}_{}_s{}", self.media_type.as_str(), self.content_id, season)
            }
            _ => format!("share:{}_{}", self.media_type.as_str(), self.content_id),
        }
    }
}

impl fmt::Display for MediaRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.episode_coords() {
            Some((s, e)) => write!(f, "tv/{} S{:02}E{:02}", self.content_id, s, e),
            None => write!(f, "{}/{}", self.media_type.as_str(), self.content_id),
        }
    }
}

// =============================================================================
// Credential Models
// =============================================================================

/// Validation state of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    #[default]
    Unvalidated,
    Validating,
    Valid,
    Invalid,
}

/// Traffic quota reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub resets_at: Option<String>,
    pub is_vip: bool,
}

impl QuotaSnapshot {
    pub fn has_traffic_remaining(&self) -> bool {
        self.used_bytes < self.limit_bytes
    }
}

impl fmt::Display for QuotaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            format_bytes(self.used_bytes),
            format_bytes(self.limit_bytes)
        )?;
        if let Some(ref reset) = self.resets_at {
            write!(f, " (resets {})", reset)?;
        }
        Ok(())
    }
}

/// A user-supplied provider secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub secret: String,
    pub status: CredentialStatus,
    pub quota: Option<QuotaSnapshot>,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            status: CredentialStatus::Unvalidated,
            quota: None,
        }
    }

    /// Secret with everything but a short prefix hidden, for logs and output
    pub fn masked(&self) -> String {
        mask_secret(&self.secret)
    }
}

// =============================================================================
// Stream Models
// =============================================================================

/// Entry of a remote folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub size_bytes: u64,
    pub extension: String,
    pub is_directory: bool,
}

/// Delivery form of a stream URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Adaptive playlist (HLS)
    Adaptive,
    /// Single progressive file (MP4)
    Progressive,
    Other,
}

impl StreamKind {
    /// Classify a URL by its path: `.m3u8` or an `hls` segment → adaptive,
    /// `.mp4` → progressive, else other
    pub fn classify(url: &str) -> Self {
        let lower = Url::parse(url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_else(|_| url.to_lowercase());
        if lower.contains(".m3u8") || lower.split('/').any(|segment| segment == "hls") {
            StreamKind::Adaptive
        } else if lower.contains(".mp4") {
            StreamKind::Progressive
        } else {
            StreamKind::Other
        }
    }

    /// Fallback preference (higher = better)
    pub fn rank(&self) -> u8 {
        match self {
            StreamKind::Adaptive => 2,
            StreamKind::Progressive => 1,
            StreamKind::Other => 0,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Adaptive => write!(f, "hls"),
            StreamKind::Progressive => write!(f, "mp4"),
            StreamKind::Other => write!(f, "other"),
        }
    }
}

/// One playable URL offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub quality: String,
    pub size_label: String,
    pub kind: StreamKind,
}

impl StreamCandidate {
    pub fn new(url: impl Into<String>, quality: impl Into<String>, size_label: impl Into<String>) -> Self {
        let url = url.into();
        let kind = StreamKind::classify(&url);
        Self {
            url,
            quality: quality.into(),
            size_label: size_label.into(),
            kind,
        }
    }
}

impl fmt::Display for StreamCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.quality, self.size_label)
    }
}

/// Uniform result shape returned by every tier and by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<StreamKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamResult {
    pub fn found(candidate: &StreamCandidate, share_token: Option<String>) -> Self {
        Self {
            success: true,
            stream_url: Some(candidate.url.clone()),
            kind: Some(candidate.kind),
            quality: Some(candidate.quality.clone()),
            size_label: Some(candidate.size_label.clone()),
            share_token,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Subtitle Models
// =============================================================================

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubFormat {
    Srt,
    WebVtt,
    Sub,
    Ass,
}

impl SubFormat {
    /// Parse format from a declared format string or file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim().to_lowercase().as_str() {
            "srt" => SubFormat::Srt,
            "vtt" | "webvtt" => SubFormat::WebVtt,
            "sub" => SubFormat::Sub,
            "ass" | "ssa" => SubFormat::Ass,
            _ => SubFormat::Srt,
        }
    }
}

impl fmt::Display for SubFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubFormat::Srt => write!(f, "SRT"),
            SubFormat::WebVtt => write!(f, "WebVTT"),
            SubFormat::Sub => write!(f, "SUB"),
            SubFormat::Ass => write!(f, "ASS"),
        }
    }
}

/// Subtitle search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleResult {
    /// Release name the subtitle was timed against
    pub release: String,
    pub download_url: String,
    pub language: String,
    pub language_name: String,
    pub format: SubFormat,
    pub downloads: u64,
    pub hearing_impaired: bool,
}

impl fmt::Display for SubtitleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hi = if self.hearing_impaired { " [HI]" } else { "" };
        write!(
            f,
            "[{}] {} ({}) - {} downloads{}",
            self.language, self.release, self.format, self.downloads, hi
        )
    }
}

/// Ranking strategy for subtitle search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Streaming-source compatibility score
    #[default]
    Smart,
    /// Download count, descending
    Popular,
    /// Provider order
    Recent,
}

/// One timed line of subtitle text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Position within the ranked results for one language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrackState {
    pub current_index: usize,
    pub total_available: usize,
}

impl SubtitleTrackState {
    /// Index the next "try another" request should use
    pub fn next_index(&self) -> usize {
        if self.total_available == 0 {
            0
        } else {
            (self.current_index + 1) % self.total_available
        }
    }
}

impl fmt::Display for SubtitleTrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current_index + 1, self.total_available)
    }
}

// =============================================================================
// Progress Models
// =============================================================================

/// Resume point for one title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueWatchingEntry {
    pub content_id: u64,
    pub media_type: MediaType,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Unix epoch milliseconds
    pub last_watched_at: i64,
}

impl ContinueWatchingEntry {
    /// Watched share in percent (0-100)
    pub fn progress_percent(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            0.0
        } else {
            self.position_seconds / self.duration_seconds * 100.0
        }
    }
}

impl fmt::Display for ContinueWatchingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type.as_str(), self.content_id)?;
        if let (Some(s), Some(e)) = (self.season, self.episode) {
            write!(f, " S{:02}E{:02}", s, e)?;
        }
        write!(
            f,
            " - {} / {} ({:.0}%)",
            format_clock(self.position_seconds),
            format_clock(self.duration_seconds),
            self.progress_percent()
        )
    }
}

// =============================================================================
// Preference Models
// =============================================================================

/// Preferred subtitle language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleLanguage {
    pub code: String,
    pub name: String,
}

/// On-screen subtitle styling preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtitleStyling {
    pub font_size: u32,
    pub text_color: String,
    pub background_color: String,
    pub background_opacity: f32,
    pub bottom_offset: u32,
    pub font_weight: String,
    pub border_radius: u32,
    pub padding_horizontal: u32,
    pub padding_vertical: u32,
    pub text_shadow: bool,
}

impl Default for SubtitleStyling {
    fn default() -> Self {
        Self {
            font_size: 16,
            text_color: "#ffffff".to_string(),
            background_color: "#000000".to_string(),
            background_opacity: 0.75,
            bottom_offset: 30,
            font_weight: "400".to_string(),
            border_radius: 4,
            padding_horizontal: 12,
            padding_vertical: 6,
            text_shadow: false,
        }
    }
}

/// Provider storage region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Server {
    pub group_id: &'static str,
    pub country: &'static str,
    pub description: &'static str,
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.group_id, self.country, self.description)
    }
}

/// Every region the provider exposes
pub const AVAILABLE_SERVERS: &[Server] = &[
    Server { group_id: "USA6", country: "US WEST", description: "Western United States" },
    Server { group_id: "USA7", country: "US EAST", description: "Eastern United States" },
    Server { group_id: "USA5", country: "US MIDDLE", description: "Middle United States" },
    Server { group_id: "UK3", country: "UK", description: "London England" },
    Server { group_id: "CA1", country: "CA", description: "Canada" },
    Server { group_id: "FR1", country: "FR", description: "France" },
    Server { group_id: "DE2", country: "DE", description: "Germany" },
    Server { group_id: "SG1", country: "SG", description: "Singapore" },
    Server { group_id: "SZ", country: "CN", description: "China MainLand" },
];

/// Region used until the user picks one
pub const DEFAULT_SERVER: &str = "USA7";

// =============================================================================
// Utility Functions
// =============================================================================

/// Format a byte count for display
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.0} MB", bytes as f64 / MB as f64)
    } else {
        format!("{} KB", bytes / KB)
    }
}

/// Format seconds as HH:MM:SS or MM:SS
pub fn format_clock(seconds: f64) -> String {
    let total_secs = seconds.max(0.0) as u64;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Keep the first four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}…", prefix)
}

// =============================================================================
// Unit Tests
// =============================================================================

//! Configuration management for limestream
//!
//! Handles config file loading/saving. Config is stored at
//! ~/.config/limestream/config.toml and every field is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::SortStrategy;
use crate::store::FileStore;

/// Provider endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Encrypted catalog search API
    pub catalog: String,
    /// Share host (folder listings, quality listings, account queries)
    pub share: String,
    /// Legacy per-credential stream API (tier 2)
    pub legacy: String,
    /// Simplified stream API (tier 3)
    pub tertiary: String,
    /// Subtitle search API
    pub subtitles: String,
    /// Metadata API used for catalog id → industry id translation
    pub metadata: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            catalog: "https://mbpapi.shegu.net/api/api_client/index/".to_string(),
            share: "https://www.febbox.com".to_string(),
            legacy: "https://febapi.nuvioapp.space".to_string(),
            tertiary: "https://fembox.aether.mom".to_string(),
            subtitles: "https://rest.opensubtitles.org".to_string(),
            metadata: "https://api.themoviedb.org/3".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    /// Timeout for every provider request
    pub request_timeout_secs: u64,
    /// Timeout for subtitle payload downloads
    pub subtitle_download_timeout_secs: u64,
    /// Default subtitle ranking
    pub subtitle_sort: SortStrategy,
    /// Override for the key-value store file
    pub store_path: Option<PathBuf>,
    /// Metadata API bearer token
    pub tmdb_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            request_timeout_secs: 15,
            subtitle_download_timeout_secs: 30,
            subtitle_sort: SortStrategy::Smart,
            store_path: None,
            tmdb_api_key: None,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/limestream/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("limestream").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit file; unlike `load`, errors are reported
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn subtitle_download_timeout(&self) -> Duration {
        Duration::from_secs(self.subtitle_download_timeout_secs)
    }

    /// Store file location (config override, else platform data dir)
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(FileStore::default_path)
    }

    /// Metadata API key: environment variable TMDB_API_KEY, then config file
    pub fn tmdb_api_key(&self) -> Option<String> {
        std::env::var("TMDB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.tmdb_api_key.clone())
    }
}

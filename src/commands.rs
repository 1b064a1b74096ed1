//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the library services.
//! Each handler takes CLI args, the runtime and Output, returns ExitCode.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{
    CatalogClient, LegacyClient, OpenSubtitlesClient, ShareClient, TertiaryClient, TmdbClient,
};
use crate::cli::{
    ExitCode, LanguagesAction, LanguagesCmd, Output, ProgressAction, ProgressCmd, ResolveCmd,
    ServerAction, ServerCmd, ShareAction, ShareCmd, StatusOk, StylingAction, StylingCmd,
    SubtitlesCmd, TokensAction, TokensCmd,
};
use crate::config::Config;
use crate::credentials::CredentialPool;
use crate::models::{
    ContinueWatchingEntry, CredentialStatus, MediaRequest, QuotaSnapshot, StreamCandidate,
    StreamResult, SubFormat, SubtitleCue, SubtitleLanguage, AVAILABLE_SERVERS,
};
use crate::prefs::{find_server, Preferences};
use crate::progress::{ProgressStore, SaveOutcome};
use crate::store::{FileStore, SharedStore};
use crate::stream::share::parse_share_token;
use crate::stream::{Orchestrator, ShareTier, Tier};
use crate::subtitles::{convert, SubtitleRequest, SubtitleService, SubtitleTrack};

// =============================================================================
// Runtime
// =============================================================================

/// Configuration plus the backing store, shared by every handler
pub struct Runtime {
    pub config: Config,
    pub store: SharedStore,
}

impl Runtime {
    /// Load config (explicit path or default location) and open the store
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::load(),
        };
        let store = FileStore::open(config.store_path());
        debug!(store = %store.path().display(), "store opened");
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn new(config: Config, store: SharedStore) -> Self {
        Self { config, store }
    }

    fn tmdb(&self) -> Option<TmdbClient> {
        self.config.tmdb_api_key().map(|key| {
            TmdbClient::new(
                key,
                self.config.endpoints.metadata.clone(),
                self.config.request_timeout(),
            )
        })
    }

    fn share_client(&self) -> ShareClient {
        ShareClient::new(self.config.endpoints.share.clone(), self.config.request_timeout())
    }
}

// =============================================================================
// Resolve Command
// =============================================================================

#[derive(Debug, Serialize)]
struct ResolveOutput {
    request: String,
    tier: Option<Tier>,
    #[serde(flatten)]
    result: StreamResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    candidates: Vec<StreamCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attempts: Vec<String>,
}

pub async fn resolve_cmd(cmd: ResolveCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    if let Err(e) = cmd.media.validate() {
        return output.error(e, ExitCode::InvalidArgs);
    }

    let prefs = Preferences::new(runtime.store.clone());
    let region = match cmd.server.as_deref() {
        Some(group_id) => match find_server(group_id) {
            Some(server) => server.group_id,
            None => {
                return output.error(format!("Unknown server '{}'", group_id), ExitCode::InvalidArgs)
            }
        },
        None => prefs.region().group_id,
    };

    let mut request = cmd.media.to_request();
    fill_external_id(runtime, &mut request).await;
    output.info(format!("Resolving {} via {}", request, region));

    let config = &runtime.config;
    let timeout = config.request_timeout();
    let primary = ShareTier::new(
        CatalogClient::new(config.endpoints.catalog.clone(), timeout),
        runtime.share_client(),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(LegacyClient::new(config.endpoints.legacy.clone(), timeout)),
        Arc::new(TertiaryClient::new(config.endpoints.tertiary.clone(), timeout)),
    )
    .with_primary(Arc::new(primary))
    .with_region(region);

    let share_key = request.share_cache_key();
    let cached = if cmd.no_cache {
        None
    } else {
        runtime.store.get(&share_key)
    };

    let mut pool = CredentialPool::load(runtime.store.clone());
    let resolution = orchestrator
        .resolve(&request, &mut pool, cached.as_deref())
        .await;

    if resolution.share_updated && !cmd.no_cache {
        if let Some(ref token) = resolution.result.share_token {
            match runtime.store.set(&share_key, token) {
                Ok(()) => debug!(key = %share_key, "share link cached"),
                Err(e) => warn!(error = %e, "failed to cache share link"),
            }
        }
    }

    let attempts: Vec<String> = resolution.attempts.iter().map(|a| a.to_string()).collect();
    if !resolution.is_success() {
        for attempt in &attempts {
            output.info(format!("  {}", attempt));
        }
        let reason = resolution
            .result
            .error
            .unwrap_or_else(|| "All providers failed".to_string());
        return output.error(reason, ExitCode::NoStreams);
    }

    output.finish(ResolveOutput {
        request: request.to_string(),
        tier: resolution.tier,
        result: resolution.result,
        candidates: if cmd.all { resolution.candidates } else { Vec::new() },
        attempts,
    })
}

/// Look up the IMDB id on TMDB when the caller did not give one
async fn fill_external_id(runtime: &Runtime, request: &mut MediaRequest) {
    if request.external_id.is_some() {
        return;
    }
    let Some(tmdb) = runtime.tmdb() else {
        debug!("no TMDB key, catalog search will be skipped");
        return;
    };
    match tmdb.imdb_id(request.content_id, request.media_type).await {
        Ok(Some(id)) => request.external_id = Some(id),
        Ok(None) => debug!(content_id = request.content_id, "TMDB has no IMDB id"),
        Err(e) => warn!(error = %e, "IMDB id lookup failed"),
    }
}

// =============================================================================
// Subtitles Command
// =============================================================================

#[derive(Debug, Serialize)]
struct SubtitleOutput {
    release: String,
    language: String,
    format: SubFormat,
    /// "current/total" among ranked results
    track: String,
    cues: usize,
    /// Subtitle clock looked up for `--at`, offset applied
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cue: Option<SubtitleCue>,
}

pub async fn subtitles_cmd(cmd: SubtitlesCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    if let Err(e) = cmd.media.validate() {
        return output.error(e, ExitCode::InvalidArgs);
    }

    let config = &runtime.config;
    let source = OpenSubtitlesClient::new(
        config.endpoints.subtitles.clone(),
        config.request_timeout(),
        config.subtitle_download_timeout(),
    );
    let strategy = cmd.sort.map(Into::into).unwrap_or(config.subtitle_sort);
    let mut service = SubtitleService::new(Arc::new(source), strategy);
    if let Some(tmdb) = runtime.tmdb() {
        service = service.with_id_resolver(Arc::new(tmdb));
    }

    let request = SubtitleRequest::new(cmd.media.to_request(), cmd.language.clone());
    output.info(format!("Searching {} subtitles for {}", cmd.language, request.media));

    if cmd.list {
        return match service.search(&request).await {
            Ok(results) => output.finish(results),
            Err(e) => output.fail("Subtitle search failed", &e),
        };
    }

    let loaded = match service.fetch(&request, cmd.index).await {
        Ok(loaded) => loaded,
        Err(e) => return output.fail("Subtitle download failed", &e),
    };
    output.info(format!("Selected {}", loaded.result));

    if let Some(ref path) = cmd.output {
        if let Err(e) = std::fs::write(path, &loaded.srt) {
            return output.error(format!("Failed to write {}: {}", path.display(), e), ExitCode::Error);
        }
        output.info(format!("Saved to {}", path.display()));
    }

    let track = SubtitleTrack::new();
    track.load(loaded.cues);
    track.set_offset(cmd.offset);
    let cue = cmd.at.and_then(|at| {
        track
            .snapshot()
            .lookup_at(at, track.offset())
            .cloned()
    });

    output.finish(SubtitleOutput {
        release: loaded.result.release,
        language: loaded.result.language_name,
        format: loaded.result.format,
        track: loaded.state.to_string(),
        cues: track.snapshot().len(),
        subtitle_time: cmd.at.map(|at| convert::format_timestamp(at - cmd.offset)),
        cue,
    })
}

// =============================================================================
// Tokens Command
// =============================================================================

#[derive(Debug, Serialize)]
struct TokenView {
    position: usize,
    token: String,
    primary: bool,
    status: CredentialStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    quota: Option<QuotaSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    traffic_remaining: Option<bool>,
}

fn token_views(pool: &CredentialPool) -> Vec<TokenView> {
    pool.credentials()
        .iter()
        .enumerate()
        .map(|(index, c)| TokenView {
            position: index + 1,
            token: c.masked(),
            primary: index == pool.primary_index(),
            status: c.status,
            quota: c.quota.clone(),
            traffic_remaining: c.quota.as_ref().map(QuotaSnapshot::has_traffic_remaining),
        })
        .collect()
}

/// 1-based position from the command line to a pool index
fn to_index(position: usize, output: &Output) -> std::result::Result<usize, ExitCode> {
    position
        .checked_sub(1)
        .ok_or_else(|| output.error("Positions start at 1", ExitCode::InvalidArgs))
}

pub async fn tokens_cmd(cmd: TokensCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let mut pool = CredentialPool::load(runtime.store.clone());

    let outcome = match cmd.action {
        TokensAction::List => Ok(()),
        TokensAction::Add { secret } => pool.add(&secret).map(|index| {
            output.info(format!("Added token {}", index + 1));
        }),
        TokensAction::Update { position, secret } => match to_index(position, output) {
            Ok(index) => pool.update(index, &secret),
            Err(code) => return code,
        },
        TokensAction::Remove { position } => match to_index(position, output) {
            Ok(index) => pool.remove(index).map(|removed| {
                output.info(format!("Removed {}", removed.masked()));
            }),
            Err(code) => return code,
        },
        TokensAction::Validate => {
            output.info(format!("Validating {} token(s)...", pool.len()));
            pool.validate_all(&runtime.share_client()).await;
            Ok(())
        }
    };

    match outcome {
        Ok(()) => output.finish(token_views(&pool)),
        Err(e) => output.fail("Token update failed", &e),
    }
}

// =============================================================================
// Progress Command
// =============================================================================

#[derive(Debug, Serialize)]
struct SaveOutput {
    outcome: SaveOutcome,
    percent: f64,
}

pub async fn progress_cmd(cmd: ProgressCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let progress = ProgressStore::new(runtime.store.clone());

    match cmd.action {
        ProgressAction::Save {
            media,
            position,
            duration,
        } => {
            if let Err(e) = media.validate() {
                return output.error(e, ExitCode::InvalidArgs);
            }
            let request = media.to_request();
            let entry = ContinueWatchingEntry {
                content_id: request.content_id,
                media_type: request.media_type,
                position_seconds: position,
                duration_seconds: duration,
                season: request.season,
                episode: request.episode,
                last_watched_at: chrono::Utc::now().timestamp_millis(),
            };
            let percent = entry.progress_percent();
            output.info(format!("Saving {}", entry));
            match progress.save(entry) {
                Ok(outcome) => output.finish(SaveOutput { outcome, percent }),
                Err(e) => output.fail("Failed to save progress", &e),
            }
        }
        ProgressAction::Get { id } => match progress.get_one(id) {
            Some(entry) => output.finish(entry),
            None => output.error(format!("No progress for {}", id), ExitCode::NotFound),
        },
        ProgressAction::List => output.finish(progress.get_all()),
        ProgressAction::Remove { id } => match progress.remove(id) {
            Ok(()) => output.finish(StatusOk::default()),
            Err(e) => output.fail("Failed to remove progress", &e),
        },
        ProgressAction::Clear => match progress.clear_all() {
            Ok(()) => output.finish(StatusOk::default()),
            Err(e) => output.fail("Failed to clear progress", &e),
        },
    }
}

// =============================================================================
// Share Command
// =============================================================================

#[derive(Debug, Serialize)]
struct ShareOutput {
    key: String,
    token: Option<String>,
}

pub async fn share_cmd(cmd: ShareCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let store = &runtime.store;

    let result = match cmd.action {
        ShareAction::Get(key) => {
            let key = key.to_request().share_cache_key();
            let token = store.get(&key);
            ShareOutput { key, token }
        }
        ShareAction::Set { key, link } => {
            let token = parse_share_token(&link);
            if token.is_empty() {
                return output.error("Share link is empty", ExitCode::InvalidArgs);
            }
            let key = key.to_request().share_cache_key();
            if let Err(e) = store.set(&key, &token) {
                return output.error(format!("Failed to save share link: {}", e), ExitCode::Error);
            }
            ShareOutput {
                key,
                token: Some(token),
            }
        }
        ShareAction::Clear(key) => {
            let key = key.to_request().share_cache_key();
            if let Err(e) = store.remove(&key) {
                return output.error(format!("Failed to clear share link: {}", e), ExitCode::Error);
            }
            ShareOutput { key, token: None }
        }
    };

    output.finish(result)
}

// =============================================================================
// Preference Commands
// =============================================================================

pub async fn languages_cmd(cmd: LanguagesCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let prefs = Preferences::new(runtime.store.clone());

    let changed = match cmd.action {
        LanguagesAction::List => Ok(true),
        LanguagesAction::Add { code, name } => prefs.add_language(SubtitleLanguage { code, name }),
        LanguagesAction::Remove { code } => prefs.remove_language(&code),
    };

    match changed {
        Ok(false) => output.info("Nothing to change"),
        Ok(true) => {}
        Err(e) => return output.fail("Language update failed", &e),
    }
    output.finish(prefs.languages())
}

pub async fn styling_cmd(cmd: StylingCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let prefs = Preferences::new(runtime.store.clone());

    let styling = match cmd.action {
        StylingAction::Show => Ok(prefs.styling()),
        StylingAction::Set { patch } => match serde_json::from_str::<serde_json::Value>(&patch) {
            Ok(value) => prefs.update_styling(&value),
            Err(e) => return output.error(format!("Invalid JSON: {}", e), ExitCode::InvalidArgs),
        },
        StylingAction::Reset => prefs.reset_styling(),
    };

    match styling {
        Ok(styling) => output.finish(styling),
        Err(e) => output.fail("Styling update failed", &e),
    }
}

pub async fn server_cmd(cmd: ServerCmd, runtime: &Runtime, output: &Output) -> ExitCode {
    let prefs = Preferences::new(runtime.store.clone());

    match cmd.action {
        ServerAction::List => output.finish(AVAILABLE_SERVERS),
        ServerAction::Get => output.finish(prefs.region()),
        ServerAction::Set { group_id } => match prefs.set_region(&group_id) {
            Ok(server) => {
                output.info(format!("Region set to {}", server));
                output.finish(server)
            }
            Err(e) => output.fail("Region update failed", &e),
        },
    }
}

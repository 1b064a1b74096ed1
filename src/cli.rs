//! CLI - Command Line Interface for LimeStream
//!
//! Every library operation is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Find a stream for a movie or an episode
//! limestream resolve 550 --imdb tt0137523
//! limestream resolve 1399 -t tv -s 1 -e 3
//!
//! # Subtitles
//! limestream subtitles 550 --list
//! limestream subtitles 550 --index 2 --at 125.5 --offset -0.5
//!
//! # Persisted state
//! limestream tokens add <secret>
//! limestream progress save 550 --position 1800 --duration 8340
//! limestream server set UK3
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::error::ResolveError;
use crate::models::{MediaRequest, MediaType, SortStrategy};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error or provider down
    NetworkError = 3,
    /// Title, subtitle or entry not found
    NotFound = 4,
    /// No streams available from any tier
    NoStreams = 5,
    /// Credential rejected
    AuthFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<&ResolveError> for ExitCode {
    fn from(error: &ResolveError) -> Self {
        match error {
            ResolveError::Authentication(_) => ExitCode::AuthFailed,
            ResolveError::NotFound(_) => ExitCode::NotFound,
            ResolveError::ServiceUnavailable(_) | ResolveError::Request(_) => ExitCode::NetworkError,
            ResolveError::InvalidRequest(_) => ExitCode::InvalidArgs,
            ResolveError::Parse(_) | ResolveError::Storage(_) => ExitCode::Error,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// LimeStream - stream resolution and subtitles for LimeTV
#[derive(Parser, Debug)]
#[command(
    name = "limestream",
    version,
    about = "Stream resolution, subtitles and watch progress for LimeTV",
    long_about = "Finds a playable stream for a movie or TV episode by falling through \
                  the share, legacy and HLS providers with a rotating pool of account \
                  tokens. Also fetches subtitles and keeps continue-watching progress.",
    after_help = "EXAMPLES:\n\
                  limestream resolve 550 --imdb tt0137523     Resolve a movie\n\
                  limestream resolve 1399 -t tv -s 1 -e 3     Resolve an episode\n\
                  limestream subtitles 550 -l spa --list      List Spanish subtitles\n\
                  limestream tokens validate --json           Check token quotas"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }

    /// Default tracing filter when RUST_LOG is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "limestream=debug"
        } else {
            "limestream=info"
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find a playable stream for a movie or episode
    #[command(visible_alias = "r")]
    Resolve(ResolveCmd),

    /// Search, download and inspect subtitles
    #[command(visible_alias = "subs")]
    Subtitles(SubtitlesCmd),

    /// Manage provider account tokens
    Tokens(TokensCmd),

    /// Continue-watching progress
    Progress(ProgressCmd),

    /// Cached share links per title
    Share(ShareCmd),

    /// Preferred subtitle languages
    Languages(LanguagesCmd),

    /// Subtitle styling
    Styling(StylingCmd),

    /// Storage region
    Server(ServerCmd),
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// Media type argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaTypeArg {
    #[default]
    Movie,
    Tv,
}

impl From<MediaTypeArg> for MediaType {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Movie => MediaType::Movie,
            MediaTypeArg::Tv => MediaType::Tv,
        }
    }
}

/// Identifies a title, and for TV an episode
#[derive(Args, Debug, Clone)]
pub struct MediaArgs {
    /// TMDB id of the movie or show
    #[arg(required = true)]
    pub id: u64,

    /// Media type
    #[arg(long = "type", short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,

    /// Season number (TV)
    #[arg(long, short = 's')]
    pub season: Option<u32>,

    /// Episode number (TV)
    #[arg(long, short = 'e')]
    pub episode: Option<u32>,

    /// IMDB id (looked up on TMDB when omitted)
    #[arg(long)]
    pub imdb: Option<String>,
}

impl MediaArgs {
    pub fn to_request(&self) -> MediaRequest {
        MediaRequest {
            content_id: self.id,
            external_id: self.imdb.clone(),
            media_type: self.media_type.into(),
            season: self.season,
            episode: self.episode,
        }
    }

    /// TV needs both season and episode
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.media_type == MediaTypeArg::Tv && (self.season.is_none() || self.episode.is_none()) {
            return Err("TV requests need --season and --episode");
        }
        if let Some(ref imdb) = self.imdb {
            validate_imdb_id(imdb)?;
        }
        Ok(())
    }
}

// =============================================================================
// Resolve Command
// =============================================================================

/// Find a playable stream for a movie or episode
#[derive(Args, Debug)]
pub struct ResolveCmd {
    #[command(flatten)]
    pub media: MediaArgs,

    /// Storage region override for this run (e.g. UK3)
    #[arg(long)]
    pub server: Option<String>,

    /// Ignore and do not update the cached share link
    #[arg(long)]
    pub no_cache: bool,

    /// Include every candidate, not just the best
    #[arg(long, short = 'a')]
    pub all: bool,
}

// =============================================================================
// Subtitles Command
// =============================================================================

/// Search, download and inspect subtitles
#[derive(Args, Debug)]
pub struct SubtitlesCmd {
    #[command(flatten)]
    pub media: MediaArgs,

    /// Language code (OpenSubtitles three-letter id)
    #[arg(long, short = 'l', default_value = "eng")]
    pub language: String,

    /// Ranking strategy (defaults to config)
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// List ranked results without downloading
    #[arg(long)]
    pub list: bool,

    /// Which ranked result to download (0-based)
    #[arg(long, short = 'i', default_value = "0")]
    pub index: usize,

    /// Show the cue on screen at this playback time (seconds)
    #[arg(long)]
    pub at: Option<f64>,

    /// Sync offset in seconds (positive delays subtitles)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub offset: f64,

    /// Write the converted SRT here
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Subtitle ranking argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortArg {
    Smart,
    Popular,
    Recent,
}

impl From<SortArg> for SortStrategy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Smart => SortStrategy::Smart,
            SortArg::Popular => SortStrategy::Popular,
            SortArg::Recent => SortStrategy::Recent,
        }
    }
}

// =============================================================================
// Tokens Command
// =============================================================================

/// Manage provider account tokens
#[derive(Args, Debug)]
pub struct TokensCmd {
    #[command(subcommand)]
    pub action: TokensAction,
}

#[derive(Subcommand, Debug)]
pub enum TokensAction {
    /// List tokens (masked) and the primary index
    List,
    /// Append a token
    Add { secret: String },
    /// Replace the token at a 1-based position
    Update { position: usize, secret: String },
    /// Remove the token at a 1-based position
    Remove { position: usize },
    /// Check every token against the provider and report quota
    Validate,
}

// =============================================================================
// Progress Command
// =============================================================================

/// Continue-watching progress
#[derive(Args, Debug)]
pub struct ProgressCmd {
    #[command(subcommand)]
    pub action: ProgressAction,
}

#[derive(Subcommand, Debug)]
pub enum ProgressAction {
    /// Record a resume point
    Save {
        #[command(flatten)]
        media: MediaArgs,
        /// Playback position in seconds
        #[arg(long, short = 'p')]
        position: f64,
        /// Total duration in seconds
        #[arg(long, short = 'd')]
        duration: f64,
    },
    /// Show one entry
    Get { id: u64 },
    /// Show all entries, most recent first
    List,
    /// Drop one entry
    Remove { id: u64 },
    /// Drop every entry
    Clear,
}

// =============================================================================
// Share Command
// =============================================================================

/// Cached share links per title (per season for TV)
#[derive(Args, Debug)]
pub struct ShareCmd {
    #[command(subcommand)]
    pub action: ShareAction,
}

#[derive(Subcommand, Debug)]
pub enum ShareAction {
    /// Show the cached share token
    Get(MediaArgs),
    /// Store a share token or link
    Set {
        #[command(flatten)]
        key: MediaArgs,
        /// Token or full share URL
        #[arg(long)]
        link: String,
    },
    /// Forget the cached share token
    Clear(MediaArgs),
}

// =============================================================================
// Preference Commands
// =============================================================================

/// Preferred subtitle languages
#[derive(Args, Debug)]
pub struct LanguagesCmd {
    #[command(subcommand)]
    pub action: LanguagesAction,
}

#[derive(Subcommand, Debug)]
pub enum LanguagesAction {
    List,
    /// Add a language, e.g. `add spa Spanish`
    Add { code: String, name: String },
    Remove { code: String },
}

/// Subtitle styling
#[derive(Args, Debug)]
pub struct StylingCmd {
    #[command(subcommand)]
    pub action: StylingAction,
}

#[derive(Subcommand, Debug)]
pub enum StylingAction {
    Show,
    /// Merge a JSON object, e.g. `set '{"fontSize": 22}'`
    Set { patch: String },
    Reset,
}

/// Storage region
#[derive(Args, Debug)]
pub struct ServerCmd {
    #[command(subcommand)]
    pub action: ServerAction,
}

#[derive(Subcommand, Debug)]
pub enum ServerAction {
    /// List available regions
    List,
    /// Show the selected region
    Get,
    /// Select a region by group id
    Set { group_id: String },
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize)]
pub struct StatusOk {
    pub status: &'static str,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print success data and report how it went
    pub fn finish<T: Serialize>(&self, data: T) -> ExitCode {
        match self.print(data) {
            Ok(()) => ExitCode::Success,
            Err(e) => self.error(format!("Failed to serialize: {}", e), ExitCode::Error),
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print a library error with its semantic exit code
    pub fn fail(&self, context: &str, error: &ResolveError) -> ExitCode {
        self.error(format!("{}: {}", context, error), ExitCode::from(error))
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    if id.starts_with("tt") && id.len() >= 9 && id[2..].chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err("Invalid IMDB ID format (expected tt followed by 7+ digits)")
    }
}

// =============================================================================
// Tests
// =============================================================================

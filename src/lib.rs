//! LimeStream - stream resolution and subtitles for LimeTV
//!
//! Finds a playable stream for a movie or episode by falling through three
//! provider tiers with a rotating pool of account credentials, fetches and
//! converts subtitles, and keeps "continue watching" progress.
//!
//! # Modules
//!
//! - `models` - Requests, credentials, streams, subtitles, progress entries
//! - `api` - Provider HTTP clients
//! - `stream` - Share resolution, normalization, tier fallback
//! - `subtitles` - Conversion, ranking, acquisition, cue lookup
//! - `credentials` - Credential pool with persisted primary index
//! - `progress` / `prefs` - Persisted user state
//! - `store` - Key-value persistence
//! - `cli` / `commands` - Command line surface

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod prefs;
pub mod progress;
pub mod store;
pub mod stream;
pub mod subtitles;

// Re-export commonly used types
pub use models::{
    ContinueWatchingEntry, Credential, MediaRequest, MediaType, SortStrategy, StreamCandidate,
    StreamKind, StreamResult, SubtitleCue, SubtitleResult,
};

pub use config::Config;
pub use credentials::CredentialPool;
pub use error::ResolveError;
pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use stream::{Orchestrator, Resolution};
pub use subtitles::{CueIndex, SubtitleService};

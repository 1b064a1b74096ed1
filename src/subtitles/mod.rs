//! Subtitle acquisition and synchronization
//!
//! - `convert`: gzip, ASS → SRT, SRT/WebVTT parsing
//! - `rank`: smart/popular/recent ordering
//! - `service`: search, cycling and download orchestration
//! - `cues`: time-indexed lookup for playback

pub mod convert;
pub mod cues;
pub mod rank;
pub mod service;

pub use cues::{CueIndex, SubtitleTrack};
pub use service::{LoadedSubtitle, SubtitleRequest, SubtitleService};

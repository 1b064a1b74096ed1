//! Stream resolution
//!
//! - Share: walk a cloud-drive share down to a playable file
//! - Normalize: turn provider quality listings into one best candidate
//! - Fallback: the three-tier waterfall across providers and credentials

pub mod fallback;
pub mod normalize;
pub mod share;

pub use fallback::{Orchestrator, Resolution, ShareTier, Tier};
pub use share::{ShareResolver, ShareSource, ShareTarget};

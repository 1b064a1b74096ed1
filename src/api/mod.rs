//! API clients for external services
//!
//! - Catalog: encrypted search against the provider catalogue
//! - Share: cloud-drive shares, quality listings and account traffic
//! - Legacy / Tertiary: fallback stream APIs
//! - OpenSubtitles: subtitle search and download
//! - TMDB: catalogue id to IMDb id translation

pub mod catalog;
pub mod legacy;
pub mod opensubtitles;
pub mod share;
pub mod tertiary;
pub mod tmdb;

pub use catalog::CatalogClient;
pub use legacy::LegacyClient;
pub use opensubtitles::OpenSubtitlesClient;
pub use share::ShareClient;
pub use tertiary::TertiaryClient;
pub use tmdb::TmdbClient;

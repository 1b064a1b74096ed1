//! Error taxonomy shared by every provider client and resolver
//!
//! The orchestrator inspects these variants to decide whether to try the
//! next credential, abort a tier, or give up.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single provider interaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Credential rejected by the provider; do not retry with the same one
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No matching folder, file, episode, stream or subtitle
    #[error("Not found: {0}")]
    NotFound(String),

    /// 5xx or timeout; the provider itself is unhealthy
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed listing, envelope or subtitle payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Transport failure that does not indicate an unhealthy provider
    #[error("Request failed: {0}")]
    Request(String),

    /// Caller supplied an incomplete request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Persisted state could not be written
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ResolveError {
    /// Map a non-success HTTP status onto the taxonomy
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        match status.as_u16() {
            500 | 502 | 503 | 504 => {
                ResolveError::ServiceUnavailable(format!("{} returned HTTP {}", context, status))
            }
            401 | 403 => {
                ResolveError::Authentication(format!("{} returned HTTP {}", context, status))
            }
            404 => ResolveError::NotFound(format!("{} returned HTTP {}", context, status)),
            _ => ResolveError::Request(format!("{} returned HTTP {}", context, status)),
        }
    }

    /// True when the whole tier should be abandoned
    pub fn is_service_down(&self) -> bool {
        matches!(self, ResolveError::ServiceUnavailable(_))
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ResolveError::ServiceUnavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ResolveError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ResolveError::from_status(status, "provider")
        } else {
            ResolveError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Parse(format!("JSON parse error: {}", err))
    }
}

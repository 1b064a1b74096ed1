//! Fallback orchestrator
//!
//! Runs the provider tiers strictly in order and stops at the first one that
//! yields a playable stream:
//!
//! 1. **Primary**: catalog search, share creation, share resolution. Skipped
//!    in favour of direct resolution when a cached share token exists.
//! 2. **Secondary**: legacy per-credential API, credentials tried from the
//!    primary index onwards. An unhealthy service (5xx, timeout) abandons the
//!    tier; other failures move on to the next credential.
//! 3. **Tertiary**: simplified API with the first credential of the list.
//!
//! Every failure lands in the attempt log; only the final outcome is surfaced.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::catalog::CatalogClient;
use crate::api::share::ShareClient;
use crate::credentials::CredentialPool;
use crate::error::ResolveError;
use crate::models::{mask_secret, MediaRequest, StreamCandidate, StreamResult, DEFAULT_SERVER};
use crate::stream::normalize;
use crate::stream::share::{parse_share_token, ShareResolver, ShareTarget};

// =============================================================================
// Tier Capabilities
// =============================================================================

/// Per-call context handed to the primary tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierContext {
    /// Current primary credential, if any
    pub credential: Option<String>,
    pub region: String,
}

/// Successful tier outcome
#[derive(Debug, Clone, PartialEq)]
pub struct TierHit {
    pub best: StreamCandidate,
    pub candidates: Vec<StreamCandidate>,
    pub share_token: Option<String>,
}

/// Primary tier: catalog search → share → resolve
#[async_trait]
pub trait PrimaryTier: Send + Sync {
    async fn search(&self, request: &MediaRequest, ctx: &TierContext) -> Result<TierHit, ResolveError>;

    /// Resolve a known share token without searching
    async fn resolve_share(
        &self,
        share: &str,
        request: &MediaRequest,
        ctx: &TierContext,
    ) -> Result<TierHit, ResolveError>;
}

/// Links returned by the legacy API for one credential
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyStreams {
    pub candidates: Vec<StreamCandidate>,
    pub share_token: Option<String>,
}

/// Secondary tier: legacy per-credential stream API
#[async_trait]
pub trait LegacyApi: Send + Sync {
    async fn streams(
        &self,
        request: &MediaRequest,
        credential: &str,
        region: &str,
    ) -> Result<LegacyStreams, ResolveError>;
}

/// Tertiary tier: single-credential simplified API
#[async_trait]
pub trait TertiaryApi: Send + Sync {
    async fn stream(&self, request: &MediaRequest, credential: &str) -> Result<StreamCandidate, ResolveError>;
}

/// Primary tier used when none is configured
pub struct UnavailablePrimary;

#[async_trait]
impl PrimaryTier for UnavailablePrimary {
    async fn search(&self, _: &MediaRequest, _: &TierContext) -> Result<TierHit, ResolveError> {
        Err(ResolveError::ServiceUnavailable("primary tier unavailable".to_string()))
    }

    async fn resolve_share(&self, _: &str, _: &MediaRequest, _: &TierContext) -> Result<TierHit, ResolveError> {
        Err(ResolveError::ServiceUnavailable("primary tier unavailable".to_string()))
    }
}

/// Primary tier backed by the encrypted catalog and the share host
pub struct ShareTier {
    catalog: CatalogClient,
    share: ShareClient,
}

impl ShareTier {
    pub fn new(catalog: CatalogClient, share: ShareClient) -> Self {
        Self { catalog, share }
    }
}

#[async_trait]
impl PrimaryTier for ShareTier {
    async fn search(&self, request: &MediaRequest, ctx: &TierContext) -> Result<TierHit, ResolveError> {
        let external_id = request.external_id.as_deref().ok_or_else(|| {
            ResolveError::InvalidRequest("catalog search needs an external id".to_string())
        })?;

        let media = self.catalog.find(external_id, request.media_type).await?;
        debug!(
            provider_id = media.id,
            box_type = media.box_type,
            title = media.title.as_deref().unwrap_or("untitled"),
            "catalog match"
        );
        let client = self.share.with_session(ctx.credential.as_deref(), &ctx.region);
        let token = client.create_share(&media).await?;
        self.resolve_share(&token, request, ctx).await
    }

    async fn resolve_share(
        &self,
        share: &str,
        request: &MediaRequest,
        ctx: &TierContext,
    ) -> Result<TierHit, ResolveError> {
        let client = self.share.with_session(ctx.credential.as_deref(), &ctx.region);
        let resolved = ShareResolver::new(&client)
            .resolve(share, ShareTarget::for_request(request))
            .await?;
        Ok(TierHit {
            best: resolved.best,
            candidates: resolved.candidates,
            share_token: Some(share.to_string()),
        })
    }
}

// =============================================================================
// Resolution
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Secondary,
    Tertiary,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::Secondary => write!(f, "secondary"),
            Tier::Tertiary => write!(f, "tertiary"),
        }
    }
}

/// One failed tier or credential attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub tier: Tier,
    /// Credential index, for per-credential attempts
    pub credential: Option<usize>,
    pub error: ResolveError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.credential {
            Some(index) => write!(f, "{} (credential {}): {}", self.tier, index + 1, self.error),
            None => write!(f, "{}: {}", self.tier, self.error),
        }
    }
}

/// Final outcome of a resolution run
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub result: StreamResult,
    /// Tier that produced the stream
    pub tier: Option<Tier>,
    /// Every candidate the winning tier offered
    pub candidates: Vec<StreamCandidate>,
    pub attempts: Vec<Attempt>,
    /// The caller should store `result.share_token` as the new cached share
    pub share_updated: bool,
}

impl Resolution {
    fn success(tier: Tier, hit: TierHit, attempts: Vec<Attempt>, cached: Option<&str>) -> Self {
        let share_updated = hit
            .share_token
            .as_deref()
            .is_some_and(|token| Some(token) != cached);
        info!(tier = %tier, stream = %hit.best, "stream resolved");
        Self {
            result: StreamResult::found(&hit.best, hit.share_token),
            tier: Some(tier),
            candidates: hit.candidates,
            attempts,
            share_updated,
        }
    }

    fn failure(error: impl Into<String>, attempts: Vec<Attempt>) -> Self {
        Self {
            result: StreamResult::failed(error),
            tier: None,
            candidates: Vec::new(),
            attempts,
            share_updated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.success
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    primary: Arc<dyn PrimaryTier>,
    legacy: Arc<dyn LegacyApi>,
    tertiary: Arc<dyn TertiaryApi>,
    region: String,
}

impl Orchestrator {
    pub fn new(legacy: Arc<dyn LegacyApi>, tertiary: Arc<dyn TertiaryApi>) -> Self {
        Self {
            primary: Arc::new(UnavailablePrimary),
            legacy,
            tertiary,
            region: DEFAULT_SERVER.to_string(),
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn PrimaryTier>) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Locate a stream for `request`, falling through the tiers in order
    pub async fn resolve(
        &self,
        request: &MediaRequest,
        pool: &mut CredentialPool,
        cached_share: Option<&str>,
    ) -> Resolution {
        if !request.is_complete() {
            return Resolution::failure(
                ResolveError::InvalidRequest("season and episode required for TV".to_string())
                    .to_string(),
                Vec::new(),
            );
        }

        let mut attempts = Vec::new();
        let cached = cached_share
            .map(parse_share_token)
            .filter(|token| !token.is_empty());

        match self.run_primary(request, pool, cached.as_deref()).await {
            Ok(hit) => return Resolution::success(Tier::Primary, hit, attempts, cached.as_deref()),
            Err(error) => record(&mut attempts, Tier::Primary, None, error),
        }

        if let Some(hit) = self.run_secondary(request, pool, &mut attempts).await {
            return Resolution::success(Tier::Secondary, hit, attempts, cached.as_deref());
        }

        match self.run_tertiary(request, pool).await {
            Ok(hit) => return Resolution::success(Tier::Tertiary, hit, attempts, cached.as_deref()),
            Err(error) => record(&mut attempts, Tier::Tertiary, None, error),
        }

        Resolution::failure("All providers failed", attempts)
    }

    async fn run_primary(
        &self,
        request: &MediaRequest,
        pool: &CredentialPool,
        cached: Option<&str>,
    ) -> Result<TierHit, ResolveError> {
        let ctx = TierContext {
            credential: pool.rotate().first().map(|(_, c)| c.secret.clone()),
            region: self.region.clone(),
        };
        match cached {
            Some(share) => {
                debug!(share, "resolving cached share");
                self.primary.resolve_share(share, request, &ctx).await
            }
            None => self.primary.search(request, &ctx).await,
        }
    }

    async fn run_secondary(
        &self,
        request: &MediaRequest,
        pool: &mut CredentialPool,
        attempts: &mut Vec<Attempt>,
    ) -> Option<TierHit> {
        let order: Vec<(usize, String)> = pool
            .rotate()
            .into_iter()
            .map(|(index, c)| (index, c.secret.clone()))
            .collect();

        if order.is_empty() {
            record(
                attempts,
                Tier::Secondary,
                None,
                ResolveError::Authentication("no credentials configured".to_string()),
            );
            return None;
        }

        for (index, secret) in order {
            debug!(credential = index + 1, token = %mask_secret(&secret), "trying legacy API");
            let outcome = self
                .legacy
                .streams(request, &secret, &self.region)
                .await
                .and_then(|streams| {
                    normalize::pick_best(&streams.candidates)
                        .map(|best| TierHit {
                            best,
                            candidates: streams.candidates,
                            share_token: streams.share_token,
                        })
                        .ok_or_else(|| ResolveError::NotFound("no valid streams".to_string()))
                });

            match outcome {
                Ok(hit) => {
                    pool.promote(index);
                    return Some(hit);
                }
                Err(error) => {
                    let service_down = error.is_service_down();
                    record(attempts, Tier::Secondary, Some(index), error);
                    if service_down {
                        warn!("legacy API unhealthy, abandoning tier");
                        break;
                    }
                }
            }
        }
        None
    }

    async fn run_tertiary(&self, request: &MediaRequest, pool: &CredentialPool) -> Result<TierHit, ResolveError> {
        let credential = pool
            .first()
            .ok_or_else(|| ResolveError::Authentication("no credentials configured".to_string()))?;
        let best = self.tertiary.stream(request, &credential.secret).await?;
        Ok(TierHit {
            candidates: vec![best.clone()],
            best,
            share_token: None,
        })
    }
}

fn record(attempts: &mut Vec<Attempt>, tier: Tier, credential: Option<usize>, error: ResolveError) {
    warn!(tier = %tier, credential = credential.map(|i| i + 1), error = %error, "tier attempt failed");
    attempts.push(Attempt {
        tier,
        credential,
        error,
    });
}

// =============================================================================
// Unit Tests
// =============================================================================

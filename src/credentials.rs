//! Credential pool
//!
//! Ordered list of user-supplied provider secrets plus a persisted "primary"
//! index. Attempts start at the primary and wrap around; a non-primary
//! credential that succeeds becomes the new primary. The list itself is never
//! reordered and invalid credentials are never dropped automatically.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::models::{Credential, CredentialStatus, QuotaSnapshot};
use crate::store::{get_json, set_json, SharedStore};

const CREDENTIALS_KEY: &str = "credentials";
const PRIMARY_INDEX_KEY: &str = "credentials.primary";

/// Remote check of a credential's validity and quota
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, secret: &str) -> Result<QuotaSnapshot, ResolveError>;
}

/// Persisted credential list with a rotating primary
pub struct CredentialPool {
    store: SharedStore,
    credentials: Vec<Credential>,
    primary: usize,
}

impl CredentialPool {
    /// Load the list and primary index; bad data yields an empty pool
    pub fn load(store: SharedStore) -> Self {
        let secrets: Vec<String> = get_json(store.as_ref(), CREDENTIALS_KEY).unwrap_or_default();
        let credentials = secrets
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(Credential::new)
            .collect();

        let primary = store
            .get(PRIMARY_INDEX_KEY)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut pool = Self {
            store,
            credentials,
            primary,
        };
        pool.clamp_primary();
        pool
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn primary_index(&self) -> usize {
        self.primary
    }

    pub fn first(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Credentials in attempt order: primary first, then wrapping
    pub fn rotate(&self) -> Vec<(usize, &Credential)> {
        let len = self.credentials.len();
        (0..len)
            .map(|offset| {
                let index = (self.primary + offset) % len;
                (index, &self.credentials[index])
            })
            .collect()
    }

    /// Make `index` the primary; a no-op when it already is
    pub fn promote(&mut self, index: usize) {
        if index >= self.credentials.len() || index == self.primary {
            return;
        }
        info!(from = self.primary, to = index, "switching primary credential");
        self.primary = index;
        self.persist_primary();
    }

    /// Append a credential; blank input is ignored
    pub fn add(&mut self, secret: &str) -> Result<usize, ResolveError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(ResolveError::InvalidRequest("credential is empty".to_string()));
        }
        self.credentials.push(Credential::new(secret));
        self.persist_list()?;
        Ok(self.credentials.len() - 1)
    }

    /// Replace the secret at `index`; the new value starts unvalidated
    pub fn update(&mut self, index: usize, secret: &str) -> Result<(), ResolveError> {
        let slot = self
            .credentials
            .get_mut(index)
            .ok_or_else(|| ResolveError::InvalidRequest(format!("no credential at index {}", index)))?;
        *slot = Credential::new(secret.trim());
        self.persist_list()
    }

    pub fn remove(&mut self, index: usize) -> Result<Credential, ResolveError> {
        if index >= self.credentials.len() {
            return Err(ResolveError::InvalidRequest(format!(
                "no credential at index {}",
                index
            )));
        }
        let removed = self.credentials.remove(index);
        if index < self.primary {
            self.primary -= 1;
            self.persist_primary();
        }
        self.clamp_primary();
        self.persist_list()?;
        Ok(removed)
    }

    /// Validate every credential, recording status and quota
    pub async fn validate_all(&mut self, validator: &dyn CredentialValidator) {
        for credential in &mut self.credentials {
            credential.status = CredentialStatus::Validating;
        }

        for index in 0..self.credentials.len() {
            let secret = self.credentials[index].secret.clone();
            let outcome = validator.validate(&secret).await;
            let credential = &mut self.credentials[index];
            match outcome {
                Ok(quota) => {
                    debug!(index, quota = %quota, "credential valid");
                    credential.status = CredentialStatus::Valid;
                    credential.quota = Some(quota);
                }
                Err(e) => {
                    warn!(index, credential = %credential.masked(), error = %e, "credential invalid");
                    credential.status = CredentialStatus::Invalid;
                    credential.quota = None;
                }
            }
        }
    }

    /// Reset an out-of-range primary to 0 and persist the fix
    fn clamp_primary(&mut self) {
        if self.primary >= self.credentials.len().max(1) {
            self.primary = 0;
            self.persist_primary();
        }
    }

    fn persist_primary(&self) {
        if let Err(e) = self.store.set(PRIMARY_INDEX_KEY, &self.primary.to_string()) {
            warn!(error = %e, "failed to persist primary credential index");
        }
    }

    fn persist_list(&self) -> Result<(), ResolveError> {
        let secrets: Vec<&str> = self
            .credentials
            .iter()
            .map(|c| c.secret.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect();
        set_json(self.store.as_ref(), CREDENTIALS_KEY, &secrets)
            .map_err(|e| ResolveError::Storage(e.to_string()))
    }
}

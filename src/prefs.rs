//! User preferences: subtitle languages, subtitle styling, storage region

use serde_json::Value;
use tracing::warn;

use crate::error::ResolveError;
use crate::models::{Server, SubtitleLanguage, SubtitleStyling, AVAILABLE_SERVERS, DEFAULT_SERVER};
use crate::store::{get_json, set_json, SharedStore};

const LANGUAGES_KEY: &str = "subtitle.languages";
const STYLING_KEY: &str = "subtitle.styling";
const REGION_KEY: &str = "provider.region";

pub struct Preferences {
    store: SharedStore,
}

impl Preferences {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------------
    // Languages
    // -------------------------------------------------------------------------

    pub fn languages(&self) -> Vec<SubtitleLanguage> {
        get_json(self.store.as_ref(), LANGUAGES_KEY).unwrap_or_default()
    }

    /// Append a language; returns false when the code is already listed
    pub fn add_language(&self, language: SubtitleLanguage) -> Result<bool, ResolveError> {
        let code = language.code.trim();
        if code.is_empty() {
            return Err(ResolveError::InvalidRequest("language code is empty".to_string()));
        }
        let mut languages = self.languages();
        if languages.iter().any(|l| l.code.eq_ignore_ascii_case(code)) {
            return Ok(false);
        }
        languages.push(SubtitleLanguage {
            code: code.to_string(),
            name: language.name.trim().to_string(),
        });
        self.write(LANGUAGES_KEY, &languages)?;
        Ok(true)
    }

    /// Drop a language; returns false when it was not listed
    pub fn remove_language(&self, code: &str) -> Result<bool, ResolveError> {
        let mut languages = self.languages();
        let before = languages.len();
        languages.retain(|l| !l.code.eq_ignore_ascii_case(code.trim()));
        if languages.len() == before {
            return Ok(false);
        }
        self.write(LANGUAGES_KEY, &languages)?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Styling
    // -------------------------------------------------------------------------

    pub fn styling(&self) -> SubtitleStyling {
        get_json(self.store.as_ref(), STYLING_KEY).unwrap_or_default()
    }

    /// Merge a partial camelCase JSON object over the current styling
    pub fn update_styling(&self, patch: &Value) -> Result<SubtitleStyling, ResolveError> {
        let Value::Object(fields) = patch else {
            return Err(ResolveError::InvalidRequest("styling update must be an object".to_string()));
        };

        let mut merged = serde_json::to_value(self.styling())?;
        if let Value::Object(ref mut current) = merged {
            for (key, value) in fields {
                if !current.contains_key(key) {
                    return Err(ResolveError::InvalidRequest(format!("unknown styling field '{}'", key)));
                }
                current.insert(key.clone(), value.clone());
            }
        }

        let styling: SubtitleStyling = serde_json::from_value(merged)
            .map_err(|e| ResolveError::InvalidRequest(format!("invalid styling value: {}", e)))?;
        self.write(STYLING_KEY, &styling)?;
        Ok(styling)
    }

    pub fn reset_styling(&self) -> Result<SubtitleStyling, ResolveError> {
        let styling = SubtitleStyling::default();
        self.write(STYLING_KEY, &styling)?;
        Ok(styling)
    }

    // -------------------------------------------------------------------------
    // Region
    // -------------------------------------------------------------------------

    /// Selected region; the default is persisted on first read
    pub fn region(&self) -> &'static Server {
        let stored = self.store.get(REGION_KEY);
        if let Some(server) = stored.as_deref().and_then(find_server) {
            return server;
        }
        if let Some(ref unknown) = stored {
            warn!(region = %unknown, "unknown stored region, using default");
        }
        let server = default_server();
        if let Err(e) = self.store.set(REGION_KEY, server.group_id) {
            warn!(error = %e, "failed to persist default region");
        }
        server
    }

    pub fn set_region(&self, group_id: &str) -> Result<&'static Server, ResolveError> {
        let server = find_server(group_id).ok_or_else(|| {
            ResolveError::InvalidRequest(format!("unknown server '{}'", group_id))
        })?;
        self.store
            .set(REGION_KEY, server.group_id)
            .map_err(|e| ResolveError::Storage(e.to_string()))?;
        Ok(server)
    }

    fn write<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ResolveError> {
        set_json(self.store.as_ref(), key, value).map_err(|e| ResolveError::Storage(e.to_string()))
    }
}

/// Case-insensitive lookup in the region catalogue
pub fn find_server(group_id: &str) -> Option<&'static Server> {
    AVAILABLE_SERVERS
        .iter()
        .find(|s| s.group_id.eq_ignore_ascii_case(group_id.trim()))
}

fn default_server() -> &'static Server {
    find_server(DEFAULT_SERVER).unwrap_or(&AVAILABLE_SERVERS[0])
}

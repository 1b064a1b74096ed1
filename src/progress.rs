//! Playback progress store ("continue watching")
//!
//! At most ten entries, most recent first. Saves below 5% are ignored as too
//! early to matter; saves above 95% count as finished and drop the entry.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::models::ContinueWatchingEntry;
use crate::store::{get_json, set_json, SharedStore};

const CONTINUE_WATCHING_KEY: &str = "continue_watching";

pub const MAX_ENTRIES: usize = 10;
pub const MIN_PROGRESS_PERCENT: f64 = 5.0;
pub const FINISHED_PERCENT: f64 = 95.0;

/// What `save` did with an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// Too early (or zero duration); nothing stored
    Ignored,
    Saved,
    /// Past the finish threshold; any existing entry removed
    Finished,
}

pub struct ProgressStore {
    store: SharedStore,
}

impl ProgressStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a resume point, applying the threshold and eviction rules
    pub fn save(&self, entry: ContinueWatchingEntry) -> Result<SaveOutcome, ResolveError> {
        if !entry.position_seconds.is_finite() || entry.position_seconds < 0.0 {
            return Err(ResolveError::InvalidRequest(format!(
                "invalid playback position {}",
                entry.position_seconds
            )));
        }
        if entry.duration_seconds <= 0.0 || !entry.duration_seconds.is_finite() {
            return Ok(SaveOutcome::Ignored);
        }

        let percent = entry.progress_percent();
        if percent < MIN_PROGRESS_PERCENT {
            debug!(content_id = entry.content_id, percent, "progress too early, ignored");
            return Ok(SaveOutcome::Ignored);
        }
        if percent > FINISHED_PERCENT {
            info!(content_id = entry.content_id, percent, "finished watching");
            self.remove(entry.content_id)?;
            return Ok(SaveOutcome::Finished);
        }

        let mut entries = self.get_all();
        entries.retain(|e| e.content_id != entry.content_id);
        entries.insert(0, entry);
        entries.truncate(MAX_ENTRIES);
        self.persist(&entries)?;
        Ok(SaveOutcome::Saved)
    }

    pub fn remove(&self, content_id: u64) -> Result<(), ResolveError> {
        let mut entries = self.get_all();
        let before = entries.len();
        entries.retain(|e| e.content_id != content_id);
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries)
    }

    pub fn get_one(&self, content_id: u64) -> Option<ContinueWatchingEntry> {
        self.get_all().into_iter().find(|e| e.content_id == content_id)
    }

    /// All entries, most recent first; malformed data reads as empty
    pub fn get_all(&self) -> Vec<ContinueWatchingEntry> {
        get_json(self.store.as_ref(), CONTINUE_WATCHING_KEY).unwrap_or_default()
    }

    pub fn clear_all(&self) -> Result<(), ResolveError> {
        self.store
            .remove(CONTINUE_WATCHING_KEY)
            .map_err(|e| ResolveError::Storage(e.to_string()))
    }

    fn persist(&self, entries: &[ContinueWatchingEntry]) -> Result<(), ResolveError> {
        set_json(self.store.as_ref(), CONTINUE_WATCHING_KEY, entries)
            .map_err(|e| ResolveError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use crate::store::MemoryStore;

    fn entry(content_id: u64, position: f64, duration: f64) -> ContinueWatchingEntry {
        ContinueWatchingEntry {
            content_id,
            media_type: MediaType::Movie,
            position_seconds: position,
            duration_seconds: duration,
            season: None,
            episode: None,
            last_watched_at: content_id as i64,
        }
    }

    fn progress() -> ProgressStore {
        ProgressStore::new(MemoryStore::shared())
    }

    #[test]
    fn test_threshold_rules() {
        let store = progress();
        assert_eq!(store.save(entry(1, 4.0, 100.0)).unwrap(), SaveOutcome::Ignored);
        assert!(store.get_one(1).is_none());

        assert_eq!(store.save(entry(1, 50.0, 100.0)).unwrap(), SaveOutcome::Saved);
        assert_eq!(store.get_one(1).unwrap().progress_percent(), 50.0);

        assert_eq!(store.save(entry(1, 97.0, 100.0)).unwrap(), SaveOutcome::Finished);
        assert!(store.get_one(1).is_none());
    }

    #[test]
    fn test_zero_duration_ignored() {
        let store = progress();
        assert_eq!(store.save(entry(1, 10.0, 0.0)).unwrap(), SaveOutcome::Ignored);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_bad_position_leaves_list_intact() {
        let store = progress();
        store.save(entry(1, 30.0, 100.0)).unwrap();
        store.save(entry(2, 40.0, 100.0)).unwrap();

        for position in [f64::NAN, f64::INFINITY, -5.0] {
            let result = store.save(entry(3, position, 100.0));
            assert!(matches!(result, Err(ResolveError::InvalidRequest(_))));
        }

        let ids: Vec<u64> = store.get_all().iter().map(|e| e.content_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_keeps_ten_most_recent() {
        let store = progress();
        for id in 1..=11 {
            store.save(entry(id, 30.0, 100.0)).unwrap();
        }
        let ids: Vec<u64> = store.get_all().iter().map(|e| e.content_id).collect();
        assert_eq!(ids, (2..=11).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn test_resave_moves_to_front() {
        let store = progress();
        store.save(entry(1, 30.0, 100.0)).unwrap();
        store.save(entry(2, 30.0, 100.0)).unwrap();
        store.save(entry(1, 60.0, 100.0)).unwrap();

        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content_id, 1);
        assert_eq!(all[0].position_seconds, 60.0);
    }

    #[test]
    fn test_malformed_data_reads_empty() {
        let shared = MemoryStore::shared();
        shared.set(CONTINUE_WATCHING_KEY, "[{\"nope\": true}]").unwrap();
        let store = ProgressStore::new(shared);
        assert!(store.get_all().is_empty());
        assert_eq!(store.save(entry(3, 50.0, 100.0)).unwrap(), SaveOutcome::Saved);
        assert_eq!(store.get_all().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = progress();
        store.save(entry(1, 30.0, 100.0)).unwrap();
        store.save(entry(2, 30.0, 100.0)).unwrap();
        store.remove(1).unwrap();
        store.remove(42).unwrap();
        assert_eq!(store.get_all().len(), 1);
        store.clear_all().unwrap();
        assert!(store.get_all().is_empty());
    }
}

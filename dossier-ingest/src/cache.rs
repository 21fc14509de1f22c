//! Local snapshot cache
//!
//! A key-value snapshot of `{case_studies, assets, preferences}`
//! written on every state change and read once at startup. It seeds the
//! UI when the record store is empty or unreachable; the store remains
//! the source of truth whenever it answers. Writes are best-effort —
//! a failed cache write is logged, never surfaced.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::models::{Asset, CaseStudy, UserPreferences};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub case_studies: Vec<CaseStudy>,
    pub assets: Vec<Asset>,
    pub preferences: UserPreferences,
}

pub struct LocalCache {
    path: PathBuf,
    state: RwLock<CacheSnapshot>,
}

impl LocalCache {
    /// Load the snapshot from disk, falling back to defaults when the
    /// file is missing or unparseable
    pub fn load(path: PathBuf) -> Self {
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cache file unparseable, starting fresh");
                    CacheSnapshot::default()
                }
            },
            Err(_) => CacheSnapshot::default(),
        };

        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.state.read().expect("cache lock poisoned").clone()
    }

    /// Insert or replace a study (matched by id), newest first
    pub fn upsert_study(&self, study: &CaseStudy) {
        {
            let mut state = self.state.write().expect("cache lock poisoned");
            state.case_studies.retain(|s| s.id != study.id);
            state.case_studies.insert(0, study.clone());
        }
        self.persist();
    }

    /// Replace a study under its previous id (reconciliation rewrote it)
    pub fn replace_study(&self, old_id: &str, study: &CaseStudy) {
        {
            let mut state = self.state.write().expect("cache lock poisoned");
            state
                .case_studies
                .retain(|s| s.id != old_id && s.id != study.id);
            state.case_studies.insert(0, study.clone());
        }
        self.persist();
    }

    pub fn set_studies(&self, studies: Vec<CaseStudy>) {
        self.state.write().expect("cache lock poisoned").case_studies = studies;
        self.persist();
    }

    pub fn set_assets(&self, assets: Vec<Asset>) {
        self.state.write().expect("cache lock poisoned").assets = assets;
        self.persist();
    }

    pub fn set_preferences(&self, preferences: UserPreferences) {
        self.state.write().expect("cache lock poisoned").preferences = preferences;
        self.persist();
    }

    fn persist(&self) {
        let content = {
            let state = self.state.read().expect("cache lock poisoned");
            serde_json::to_string(&*state)
        };
        let result = content
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NarrativeResult, Theme};
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::load(dir.path().join("cache.json"));
        let snapshot = cache.snapshot();
        assert!(snapshot.case_studies.is_empty());
        assert!(snapshot.assets.is_empty());
        assert!(snapshot.preferences.auto_rename);
    }

    #[test]
    fn writes_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = LocalCache::load(path.clone());
        let study = CaseStudy::from_narrative(NarrativeResult::default(), Vec::new());
        cache.upsert_study(&study);
        let mut prefs = UserPreferences::default();
        prefs.theme = Theme::Dark;
        cache.set_preferences(prefs);

        let reloaded = LocalCache::load(path);
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.case_studies.len(), 1);
        assert_eq!(snapshot.case_studies[0].id, study.id);
        assert_eq!(snapshot.preferences.theme, Theme::Dark);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = LocalCache::load(path);
        assert!(cache.snapshot().case_studies.is_empty());
    }

    #[test]
    fn upsert_replaces_existing_study_and_orders_newest_first() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::load(dir.path().join("cache.json"));

        let older = CaseStudy::from_narrative(NarrativeResult::default(), Vec::new());
        let mut newer = CaseStudy::from_narrative(NarrativeResult::default(), Vec::new());
        cache.upsert_study(&older);
        cache.upsert_study(&newer);

        newer.title = "Edited".to_string();
        cache.upsert_study(&newer);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.case_studies.len(), 2);
        assert_eq!(snapshot.case_studies[0].title, "Edited");
        assert_eq!(snapshot.case_studies[1].id, older.id);
    }
}

//! The persisted Wi-Fi profile store.
//!
//! A JSON array of `{ssid, password, uri}` objects, rewritten wholesale on
//! every provisioning scan or server-pushed Wi-Fi list. Malformed content is
//! a [`ProfileStoreError`]: the caller logs it and keeps its prior state.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use helmet_core::ConnectionProfile;
use thiserror::Error;
use tracing::info;

/// Error type for profile store operations.
#[derive(Debug, Error)]
pub enum ProfileStoreError {
    #[error("I/O error accessing profiles at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile file is not a valid JSON profile array: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// File-backed list of known connection profiles.
pub struct ProfileStore {
    path: PathBuf,
    cached: Mutex<Vec<ConnectionProfile>>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(Vec::new()),
        }
    }

    /// Builds a store with a pre-seeded cache, bypassing the disk read.
    pub fn with_cached(path: impl Into<PathBuf>, profiles: Vec<ConnectionProfile>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(profiles),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the profile array from disk, refreshing the in-memory cache.
    ///
    /// A missing file is an empty list, not an error.
    pub fn load(&self) -> Result<Vec<ConnectionProfile>, ProfileStoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| ProfileStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let profiles: Vec<ConnectionProfile> = serde_json::from_str(&text)?;
        *self.cached.lock().unwrap() = profiles.clone();
        Ok(profiles)
    }

    /// Replaces the entire store with `profiles`.
    pub fn save(&self, profiles: &[ConnectionProfile]) -> Result<(), ProfileStoreError> {
        let text = serde_json::to_string(profiles)?;
        std::fs::write(&self.path, text).map_err(|source| ProfileStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        *self.cached.lock().unwrap() = profiles.to_vec();
        info!(count = profiles.len(), "profile store rewritten");
        Ok(())
    }

    /// Last successfully loaded or saved profile list.
    pub fn cached(&self) -> Vec<ConnectionProfile> {
        self.cached.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("wifi.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_rewrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("wifi.json"));
        store
            .save(&[
                ConnectionProfile::new("a", "1", "h1"),
                ConnectionProfile::new("b", "2", "h2"),
            ])
            .unwrap();
        store
            .save(&[ConnectionProfile::new("c", "3", "h3")])
            .unwrap();
        let profiles = store.load().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].ssid, "c");
    }

    #[test]
    fn test_malformed_json_is_an_error_and_cache_retained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi.json");
        let store = ProfileStore::new(&path);
        store.save(&[ConnectionProfile::new("a", "1", "h1")]).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            store.load(),
            Err(ProfileStoreError::Malformed(_))
        ));
        assert_eq!(store.cached().len(), 1);
    }
}

//! Single-value cache mirrored to a JSON file so it survives restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::ttl_cache::CacheEntry;
use crate::errors::{DiscoveryError, Result};

/// One cached value with a TTL, held in memory and snapshotted to disk.
///
/// A stale snapshot is kept around: callers that fail to refresh from
/// upstream can still fall back to it through [`FileCache::get_stale`].
pub struct FileCache<V> {
    path: Option<PathBuf>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<Arc<CacheEntry<V>>>>,
}

impl<V> FileCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Cache persisted at `path`. `None` keeps it in memory only.
    pub fn new(path: Option<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, SystemClock::shared())
    }

    pub fn with_clock(path: Option<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            path,
            ttl,
            clock,
            current: RwLock::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fresh value from memory, else from the file.
    pub fn get(&self) -> Option<V> {
        let now = self.clock.now();
        self.entry()
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Last known value regardless of age.
    pub fn get_stale(&self) -> Option<V> {
        self.entry().map(|entry| entry.value.clone())
    }

    /// Replaces the cached value and rewrites the snapshot file.
    ///
    /// The in-memory value is updated even when the write fails; the error
    /// is returned so the caller can log it.
    pub fn store(&self, value: V) -> Result<()> {
        let entry = Arc::new(CacheEntry::new(value, self.clock.now(), Some(self.ttl)));
        {
            let mut current = self.current.write().unwrap_or_else(|poisoned| {
                warn!("File cache lock was poisoned, recovering");
                poisoned.into_inner()
            });
            *current = Some(entry.clone());
        }

        if let Some(path) = &self.path {
            write_snapshot(path, entry.as_ref())?;
        }
        Ok(())
    }

    fn entry(&self) -> Option<Arc<CacheEntry<V>>> {
        let in_memory = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if in_memory.is_some() {
            return in_memory;
        }

        let loaded = self.path.as_deref().and_then(read_snapshot::<V>)?;
        let loaded = Arc::new(CacheEntry::new(
            loaded.value,
            loaded.stored_at,
            Some(self.ttl),
        ));
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(loaded.clone());
        Some(loaded)
    }
}

fn read_snapshot<V: DeserializeOwned>(path: &Path) -> Option<CacheEntry<V>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No cache snapshot at {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!("Ignoring unreadable cache snapshot {}: {}", path.display(), e);
            None
        }
    }
}

/// Writes to a sibling temp file then renames, so readers never see a
/// half-written snapshot.
pub(crate) fn write_snapshot<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path).map_err(|e| {
        DiscoveryError::Cache(format!("failed to replace {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_memory_only_cache() {
        let cache: FileCache<Vec<String>> = FileCache::new(None, Duration::from_secs(60));
        assert!(cache.get().is_none());
        cache.store(vec!["a".to_string()]).unwrap();
        assert_eq!(cache.get(), Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_snapshot_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agendas.json");
        let clock = clock();

        let first: FileCache<Vec<u32>> =
            FileCache::with_clock(Some(path.clone()), Duration::from_secs(86_400), clock.clone());
        first.store(vec![1, 2, 3]).unwrap();
        assert!(path.exists());

        let second: FileCache<Vec<u32>> =
            FileCache::with_clock(Some(path), Duration::from_secs(86_400), clock.clone());
        assert_eq!(second.get(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_expired_snapshot_only_served_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agendas.json");
        let clock = clock();

        let cache: FileCache<Vec<u32>> =
            FileCache::with_clock(Some(path), Duration::from_secs(86_400), clock.clone());
        cache.store(vec![7]).unwrap();

        clock.advance(chrono::Duration::hours(25));
        assert_eq!(cache.get(), None);
        assert_eq!(cache.get_stale(), Some(vec![7]));
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agendas.json");
        fs::write(&path, b"not json").unwrap();

        let cache: FileCache<Vec<u32>> = FileCache::new(Some(path), Duration::from_secs(60));
        assert_eq!(cache.get_stale(), None);
    }
}

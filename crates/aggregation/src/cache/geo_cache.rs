//! Geocoding memo shared by every adapter and the write path.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::file_cache::write_snapshot;
use super::ttl_cache::TtlCache;
use crate::errors::Result;
use crate::models::GeoResult;

/// Default lifetime of a "no tier could answer" entry.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(6 * 3600);

/// Positive entries never expire; negative entries expire after
/// `negative_ttl`. Curated answers are additionally written to a JSON file
/// and reloaded on start.
pub struct GeoCache {
    hits: TtlCache<String, GeoResult>,
    misses: TtlCache<String, ()>,
    persist_path: Option<PathBuf>,
    persisted: Mutex<HashMap<String, GeoResult>>,
}

impl Default for GeoCache {
    fn default() -> Self {
        Self::new(DEFAULT_NEGATIVE_TTL)
    }
}

impl GeoCache {
    /// In-memory cache on the wall clock.
    pub fn new(negative_ttl: Duration) -> Self {
        Self::with_clock(negative_ttl, SystemClock::shared())
    }

    pub fn with_clock(negative_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            hits: TtlCache::with_clock(None, clock.clone()),
            misses: TtlCache::with_clock(Some(negative_ttl), clock),
            persist_path: None,
            persisted: Mutex::new(HashMap::new()),
        }
    }

    /// Enables persistence of curated answers at `path`, loading whatever
    /// the file already holds. A missing file is not an error.
    pub fn with_persistence(mut self, path: PathBuf) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let stored: HashMap<String, GeoResult> = serde_json::from_str(&raw)?;
            info!(
                "Loaded {} persisted geocode entries from {}",
                stored.len(),
                path.display()
            );
            for (key, result) in &stored {
                self.hits.insert(key.clone(), result.clone());
            }
            self.persisted = Mutex::new(stored);
        }
        self.persist_path = Some(path);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<GeoResult> {
        self.hits.get(&key.to_string())
    }

    /// True while a recent resolution of `key` exhausted every tier.
    pub fn is_known_miss(&self, key: &str) -> bool {
        self.misses.get(&key.to_string()).is_some()
    }

    /// Stores a successful answer; curated answers are also persisted.
    pub fn insert(&self, key: &str, result: GeoResult) {
        self.misses.remove(&key.to_string());
        self.hits.insert(key.to_string(), result.clone());

        if result.confidence_source.is_curated() {
            self.persist(key, result);
        }
    }

    pub fn record_miss(&self, key: &str) {
        debug!("Geocode miss cached for '{}'", key);
        self.misses.insert(key.to_string(), ());
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    fn persist(&self, key: &str, result: GeoResult) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let mut persisted = self.persisted.lock().unwrap_or_else(|poisoned| {
            warn!("Geocode cache lock was poisoned, recovering");
            poisoned.into_inner()
        });
        if persisted.get(key) == Some(&result) {
            return;
        }
        persisted.insert(key.to_string(), result);
        if let Err(e) = write_snapshot(path, &*persisted) {
            warn!("Failed to persist geocode cache to {}: {}", path.display(), e);
        }
    }
}

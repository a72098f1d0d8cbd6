//! In-memory memoization with an optional time-to-live.
//!
//! Entries are immutable once stored: a refresh replaces the `Arc` in the
//! map, it never mutates a value another reader may hold.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};

/// Memoization record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
    /// `None` never expires.
    #[serde(default)]
    pub ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            stored_at,
            ttl,
        }
    }

    /// True while `now - stored_at < ttl`. Entries stamped in the future
    /// (clock skew) count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => match (now - self.stored_at).to_std() {
                Ok(age) => age < ttl,
                Err(_) => true,
            },
        }
    }
}

/// Thread-safe map of immutable [`CacheEntry`] values sharing one TTL.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Arc<CacheEntry<V>>>>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache whose entries expire after `ttl`, on the wall clock.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, SystemClock::shared())
    }

    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Values are idempotent re-derivations of upstream data, so a poisoned
    /// lock is recovered rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Arc<CacheEntry<V>>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Arc<CacheEntry<V>>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.read()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Entry for `key` regardless of freshness.
    pub fn get_entry(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
        self.read().get(key).cloned()
    }

    /// Stores `value`, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        let entry = Arc::new(CacheEntry::new(value, self.clock.now(), self.ttl));
        self.write().insert(key, entry);
    }

    /// Stores an entry carrying its own timestamp (used when reloading
    /// persisted snapshots).
    pub fn insert_entry(&self, key: K, entry: CacheEntry<V>) {
        self.write().insert(key, Arc::new(entry));
    }

    pub fn remove(&self, key: &K) {
        self.write().remove(key);
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use chrono::TimeZone;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_get_returns_fresh_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(Some(Duration::from_secs(60)));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = manual_clock();
        let cache: TtlCache<&str, u32> =
            TtlCache::with_clock(Some(Duration::from_secs(3600)), clock.clone());
        cache.insert("venue", 7);

        clock.advance(chrono::Duration::minutes(59));
        assert_eq!(cache.get(&"venue"), Some(7));

        clock.advance(chrono::Duration::minutes(1));
        assert_eq!(cache.get(&"venue"), None);
        // Stale entry is still visible to callers that want it
        assert!(cache.get_entry(&"venue").is_some());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let clock = manual_clock();
        let cache: TtlCache<&str, u32> = TtlCache::with_clock(None, clock.clone());
        cache.insert("k", 1);
        clock.advance(chrono::Duration::days(3650));
        assert_eq!(cache.get(&"k"), Some(1));
    }

    #[test]
    fn test_insert_replaces_without_mutating_held_entry() {
        let cache: TtlCache<&str, Vec<u32>> = TtlCache::new(None);
        cache.insert("k", vec![1]);
        let held = cache.get_entry(&"k").unwrap();
        cache.insert("k", vec![2]);
        assert_eq!(held.value, vec![1]);
        assert_eq!(cache.get(&"k"), Some(vec![2]));
    }

    #[test]
    fn test_purge_expired() {
        let clock = manual_clock();
        let cache: TtlCache<u32, u32> =
            TtlCache::with_clock(Some(Duration::from_secs(10)), clock.clone());
        cache.insert(1, 1);
        clock.advance(chrono::Duration::seconds(20));
        cache.insert(2, 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let entry = CacheEntry::new(1, now + chrono::Duration::hours(1), Some(Duration::from_secs(1)));
        assert!(entry.is_fresh(now));
    }
}

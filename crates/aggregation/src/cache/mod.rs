//! Explicit cache objects with a defined TTL policy.
//!
//! Caches are injected into the components that use them instead of living
//! as ambient module state, so tests can run them cold or against a
//! [`ManualClock`].
//!
//! - [`TtlCache`] - in-memory map of immutable entries, optional TTL
//! - [`FileCache`] - single JSON snapshot on disk mirrored in memory (agenda catalog)
//! - [`GeoCache`] - geocoding memo with negative entries and persisted curated results

mod clock;
mod file_cache;
mod geo_cache;
mod ttl_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use file_cache::FileCache;
pub use geo_cache::{GeoCache, DEFAULT_NEGATIVE_TTL};
pub use ttl_cache::{CacheEntry, TtlCache};

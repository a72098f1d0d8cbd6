//! Geocoding abstractions.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{GeoQuery, GeoResult};

/// One strategy in the geocoding fallback chain.
///
/// Tiers are tried in order until one returns a result. Returning `None`
/// means the tier has no answer for this query and the next one runs.
#[async_trait]
pub trait GeocodeTier: Send + Sync {
    /// Short identifier used in logs.
    fn id(&self) -> &'static str;

    /// Whether answers from this tier may be memoized under the query's
    /// cache key. Tiers whose answer depends on data outside the key
    /// (device coordinates) return false.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// # Returns
    /// * `Some(Ok(result))` - placed the query
    /// * `Some(Err(error))` - failed; [`RetryClass`](crate::errors::RetryClass)
    ///   decides whether the chain continues
    /// * `None` - no answer, try the next tier
    async fn resolve(&self, query: &GeoQuery) -> Option<Result<GeoResult>>;
}

/// Resolves a place description to coordinates.
///
/// Consumed by source adapters and the write path. Unlike
/// [`GeocodeTier::resolve`] this always answers: exhausting every tier
/// yields [`DiscoveryError::RecordUnresolvable`](crate::errors::DiscoveryError::RecordUnresolvable).
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, query: &GeoQuery) -> Result<GeoResult>;
}

//! Geocode resolver - cache in front of an ordered list of tiers.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use super::traits::{GeocodeTier, Geocoder};
use crate::cache::GeoCache;
use crate::errors::{DiscoveryError, Result, RetryClass};
use crate::models::{ConfidenceSource, GeoQuery, GeoResult};

/// Cache-first geocoder iterating its tiers until one answers.
///
/// The default order, built by
/// [`GeocodeResolver::standard`](super::GeocodeResolver::standard), is:
/// 1. Curated venue catalog (fuzzy match)
/// 2. Known venues table
/// 3. External geocoder with plausibility checks
/// 4. Device coordinates
///
/// Cacheable answers are written back under the query's cache key, so a
/// repeated query never reaches a tier again. Queries that exhaust every
/// tier are remembered as misses for a bounded time.
pub struct GeocodeResolver {
    cache: Arc<GeoCache>,
    tiers: Vec<Box<dyn GeocodeTier>>,
}

impl GeocodeResolver {
    /// Resolver with no tiers; add them with [`with_tier`](Self::with_tier).
    pub fn new(cache: Arc<GeoCache>) -> Self {
        Self {
            cache,
            tiers: Vec::new(),
        }
    }

    /// Appends a tier after the existing ones.
    pub fn with_tier(mut self, tier: Box<dyn GeocodeTier>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn add_tier(&mut self, tier: Box<dyn GeocodeTier>) {
        self.tiers.push(tier);
    }

    pub fn tier_ids(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.id()).collect()
    }

    pub fn cache(&self) -> &Arc<GeoCache> {
        &self.cache
    }
}

#[async_trait]
impl Geocoder for GeocodeResolver {
    async fn resolve(&self, query: &GeoQuery) -> Result<GeoResult> {
        let key = query.cache_key();
        let textual = !query.is_empty();

        if textual {
            if let Some(mut hit) = self.cache.get(&key) {
                debug!("Geocode cache hit for '{}'", key);
                hit.confidence_source = ConfidenceSource::Cache;
                return Ok(hit);
            }
        }
        // A recent miss skips every tier that could have been cached
        let known_miss = !textual || self.cache.is_known_miss(&key);
        let mut transient_failure = false;

        for tier in &self.tiers {
            if known_miss && tier.is_cacheable() {
                continue;
            }

            match tier.resolve(query).await {
                None => continue,
                Some(Ok(result)) => {
                    debug!(
                        "Geocoded '{}' via {} ({:?})",
                        key,
                        tier.id(),
                        result.confidence_source
                    );
                    if textual && tier.is_cacheable() {
                        self.cache.insert(&key, result.clone());
                    }
                    return Ok(result);
                }
                Some(Err(e)) => match e.retry_class() {
                    RetryClass::NextTier => {
                        if !matches!(
                            e,
                            DiscoveryError::ImplausibleResult { .. }
                                | DiscoveryError::RecordUnresolvable(_)
                        ) {
                            transient_failure = true;
                        }
                        warn!("Geocode tier {} failed for '{}': {}", tier.id(), key, e);
                    }
                    RetryClass::Never => return Err(e),
                },
            }
        }

        // Upstream outages are not remembered; a later call may succeed
        if textual && !known_miss && !transient_failure {
            self.cache.record_miss(&key);
        }
        Err(DiscoveryError::RecordUnresolvable(key))
    }
}

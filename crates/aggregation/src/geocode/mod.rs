//! Geocoding: place descriptions to coordinates.
//!
//! [`GeocodeResolver`] consults the [`GeoCache`](crate::cache::GeoCache) and
//! then an ordered list of [`GeocodeTier`]s. Reordering or adding tiers is a
//! matter of building the list differently; each tier is testable alone.

mod catalog_resolver;
mod chain;
mod device_resolver;
mod external_resolver;
mod landmark_resolver;
mod nominatim;
mod scoring;
mod traits;

use std::sync::Arc;

pub use catalog_resolver::{CatalogTier, Venue, VenueCatalog};
pub use chain::GeocodeResolver;
pub use device_resolver::DeviceTier;
pub use external_resolver::{
    ExternalTier, GeocodeConfig, UnknownRegionPolicy, DEFAULT_PLAUSIBILITY_MARGIN_KM,
};
pub use landmark_resolver::KnownVenueTier;
pub use nominatim::{
    GeocodedPlace, GeocodingService, NominatimClient, DEFAULT_BASE_URL as DEFAULT_NOMINATIM_URL,
    DEFAULT_USER_AGENT,
};
pub use scoring::{
    keywords, normalize_name, score_venue, EXACT_NAME_SCORE, KEYWORD_SCORE, MIN_VENUE_SCORE,
    REGION_BONUS, SUBSTRING_SCORE,
};
pub use traits::{GeocodeTier, Geocoder};

use crate::cache::GeoCache;
use crate::geo::RegionTable;

impl GeocodeResolver {
    /// Resolver with the standard tier order: curated catalog, known
    /// venues, external geocoder, device coordinates.
    pub fn standard(
        cache: Arc<GeoCache>,
        catalog: Arc<VenueCatalog>,
        service: Arc<dyn GeocodingService>,
        regions: Arc<RegionTable>,
        config: &GeocodeConfig,
    ) -> Self {
        GeocodeResolver::new(cache)
            .with_tier(Box::new(CatalogTier::new(catalog)))
            .with_tier(Box::new(KnownVenueTier::new()))
            .with_tier(Box::new(ExternalTier::new(service, regions).with_config(config)))
            .with_tier(Box::new(DeviceTier))
    }
}

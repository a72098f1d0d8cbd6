use async_trait::async_trait;

use super::traits::GeocodeTier;
use crate::errors::Result;
use crate::models::{ConfidenceSource, GeoQuery, GeoResult};

/// Tier 5: coordinates attached to the submitted media.
///
/// They locate the capture, not necessarily the venue, hence the last
/// rank. Never cached since they are not part of the query's cache key.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceTier;

#[async_trait]
impl GeocodeTier for DeviceTier {
    fn id(&self) -> &'static str {
        "DEVICE"
    }

    fn is_cacheable(&self) -> bool {
        false
    }

    async fn resolve(&self, query: &GeoQuery) -> Option<Result<GeoResult>> {
        let point = query.device_point.filter(|point| point.is_valid())?;
        Some(Ok(GeoResult::new(point, ConfidenceSource::DeviceMetadata)))
    }
}

//! Read and write entry points of the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::assembler::ResultAssembler;
use crate::cache::{Clock, SystemClock};
use crate::dedup::{content_hash, DeduplicationMatcher, EventPool, SubmitOutcome};
use crate::errors::{DiscoveryError, Result, RetryClass};
use crate::geocode::Geocoder;
use crate::models::{Event, GeoPoint, NearbyQuery};
use crate::scheduler::{AggregationDiagnostics, AggregationScheduler};

pub const DEFAULT_RADIUS_KM: f64 = 30.0;
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// `source_name` of events that arrive through [`DiscoveryService::submit`].
pub const SUBMISSION_SOURCE: &str = "submission";

/// Answer of [`DiscoveryService::nearby`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResult {
    pub events: Vec<Event>,
    /// Events each source contributed; zero for failed or timed-out sources.
    pub sources: BTreeMap<String, usize>,
    pub diagnostics: AggregationDiagnostics,
}

pub struct DiscoveryService {
    scheduler: AggregationScheduler,
    assembler: ResultAssembler,
    geocoder: Arc<dyn Geocoder>,
    pool: Arc<dyn EventPool>,
    matcher: DeduplicationMatcher,
    clock: Arc<dyn Clock>,
}

impl DiscoveryService {
    pub fn new(
        scheduler: AggregationScheduler,
        assembler: ResultAssembler,
        geocoder: Arc<dyn Geocoder>,
        pool: Arc<dyn EventPool>,
        matcher: DeduplicationMatcher,
    ) -> Self {
        Self {
            scheduler,
            assembler,
            geocoder,
            pool,
            matcher,
            clock: SystemClock::shared(),
        }
    }

    /// Replaces the clock that decides "today".
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Events within `radius_km` of `center` over `[today, today + horizon_days]`.
    ///
    /// Only a malformed request fails; degraded sources show up as zero
    /// counts and in the diagnostics.
    pub async fn nearby(
        &self,
        center: Option<GeoPoint>,
        radius_km: f64,
        horizon_days: u32,
    ) -> Result<NearbyResult> {
        let today = self.clock.now().date_naive();
        let query = NearbyQuery::new(center, radius_km, horizon_days, today)?;

        let aggregation = self.scheduler.aggregate(&query).await;
        let sources = aggregation.sources();
        let events = self.assembler.assemble(aggregation.events);

        Ok(NearbyResult {
            events,
            sources,
            diagnostics: aggregation.diagnostics,
        })
    }

    /// Stores a user submission, replacing the same occurrence if one is
    /// already live.
    ///
    /// Missing coordinates are resolved through the geocoder, with
    /// `device_point` as the last resort. A submission no tier can place is
    /// stored without coordinates.
    ///
    /// # Errors
    /// * [`DiscoveryError::InvalidRequest`] - blank title or out-of-range coordinates
    /// * [`DiscoveryError::DuplicateContent`] - identical payload already live
    pub async fn submit(
        &self,
        mut candidate: Event,
        device_point: Option<GeoPoint>,
    ) -> Result<SubmitOutcome> {
        candidate.title = candidate.title.trim().to_string();
        if candidate.title.is_empty() {
            return Err(DiscoveryError::InvalidRequest(
                "title is required".to_string(),
            ));
        }
        if candidate.point().is_some_and(|point| !point.is_valid()) {
            return Err(DiscoveryError::InvalidRequest(format!(
                "coordinates of '{}' are out of range",
                candidate.title
            )));
        }
        if candidate.source_name.is_empty() {
            candidate.source_name = SUBMISSION_SOURCE.to_string();
        }
        candidate.distance_km = None;

        if candidate.point().is_none() {
            self.locate(&mut candidate, device_point).await;
        }

        let hash = content_hash(&candidate);
        let title = candidate.title.clone();
        let outcome = self.pool.submit(candidate, hash, &self.matcher).await?;
        info!(
            "Submission '{}' {:?} as {}",
            title, outcome.action, outcome.id
        );
        Ok(outcome)
    }

    pub async fn soft_delete(&self, id: &str) -> Result<bool> {
        self.pool.soft_delete(id).await
    }

    async fn locate(&self, candidate: &mut Event, device_point: Option<GeoPoint>) {
        let query = candidate
            .geo_query()
            .with_device_point(device_point.filter(GeoPoint::is_valid));
        match self.geocoder.resolve(&query).await {
            Ok(result) => {
                debug!(
                    "Located '{}' via {:?}",
                    candidate.title, result.confidence_source
                );
                candidate.set_point(result.point());
                if candidate.city.is_none() {
                    candidate.city = result.resolved_city;
                }
            }
            Err(e) if e.retry_class() == RetryClass::NextTier => {
                debug!("'{}' stored without coordinates: {}", candidate.title, e);
            }
            Err(e) => warn!("Geocoding '{}' failed: {}", candidate.title, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::dedup::{InMemoryEventPool, SubmitAction};
    use crate::models::{ConfidenceSource, GeoQuery, GeoResult};
    use crate::scheduler::SchedulerConfig;
    use crate::sources::spatial::SpatialAdapter;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct DeviceOnlyGeocoder;

    #[async_trait]
    impl Geocoder for DeviceOnlyGeocoder {
        async fn resolve(&self, query: &GeoQuery) -> Result<GeoResult> {
            query
                .device_point
                .map(|point| GeoResult::new(point, ConfidenceSource::DeviceMetadata))
                .ok_or_else(|| DiscoveryError::RecordUnresolvable(query.cache_key()))
        }
    }

    fn service() -> DiscoveryService {
        let pool = Arc::new(InMemoryEventPool::new());
        let scheduler = AggregationScheduler::new(SchedulerConfig::default())
            .with_adapter(Arc::new(SpatialAdapter::new(pool.clone())));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        ));
        DiscoveryService::new(
            scheduler,
            ResultAssembler::default(),
            Arc::new(DeviceOnlyGeocoder),
            pool,
            DeduplicationMatcher::default(),
        )
        .with_clock(clock)
    }

    fn poster(title: &str) -> Event {
        Event {
            title: title.to_string(),
            venue_name: Some("Salle inconnue".to_string()),
            start: Some(Utc.with_ymd_and_hms(2026, 10, 24, 20, 30, 0).unwrap()),
            ..Event::default()
        }
    }

    #[tokio::test]
    async fn test_missing_center_is_rejected() {
        let result = service().nearby(None, 5.0, 30).await;
        assert!(matches!(result, Err(DiscoveryError::InvalidRequest(_))));

        let result = service()
            .nearby(Some(GeoPoint::new(f64::NAN, 2.35)), 5.0, 30)
            .await;
        assert!(matches!(result, Err(DiscoveryError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_submission_placed_by_device_point_shows_up_nearby() {
        let service = service();
        let device = GeoPoint::new(48.8600, 2.3500);
        let outcome = service
            .submit(poster("Concert de rentrée"), Some(device))
            .await
            .unwrap();
        assert_eq!(outcome.action, SubmitAction::Inserted);

        let nearby = service
            .nearby(Some(GeoPoint::new(48.8566, 2.3522)), 5.0, 30)
            .await
            .unwrap();
        assert_eq!(nearby.events.len(), 1);
        assert_eq!(nearby.events[0].id, outcome.id);
        assert_eq!(nearby.events[0].source_name, SUBMISSION_SOURCE);
        assert_eq!(nearby.sources["spatial"], 1);
    }

    #[tokio::test]
    async fn test_unplaceable_submission_is_stored_but_not_listed() {
        let service = service();
        let outcome = service.submit(poster("Bal masqué"), None).await.unwrap();
        assert_eq!(outcome.action, SubmitAction::Inserted);

        let nearby = service
            .nearby(Some(GeoPoint::new(48.8566, 2.3522)), 5.0, 30)
            .await
            .unwrap();
        assert!(nearby.events.is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let result = service().submit(poster("   "), None).await;
        assert!(matches!(result, Err(DiscoveryError::InvalidRequest(_))));
    }
}

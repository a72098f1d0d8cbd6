//! Spatial-database source: listings stored with indexed coordinates.

mod listing;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::placement::within_radius;
use super::traits::SourceAdapter;
use crate::errors::Result;
use crate::models::{Event, NearbyQuery};

pub use listing::{website_from_contacts, ListingRecord, LISTING_SOURCE_NAME};

pub const SPATIAL_SOURCE: &str = "spatial";

/// Row cap of a single spatial query.
pub const DEFAULT_SPATIAL_LIMIT: usize = 500;

/// Store answering "objects within R of P overlapping window W".
///
/// Implementations filter on the window first, then on distance, and must
/// measure distance with the great-circle metric (`haversine_km`). Results
/// carry `distance_km` and are ordered by `(distance_km, start)`.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    async fn events_within(&self, query: &NearbyQuery, limit: usize) -> Result<Vec<Event>>;
}

/// Source adapter over a [`SpatialStore`].
pub struct SpatialAdapter {
    store: Arc<dyn SpatialStore>,
    limit: usize,
}

impl SpatialAdapter {
    pub fn new(store: Arc<dyn SpatialStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_SPATIAL_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl SourceAdapter for SpatialAdapter {
    fn id(&self) -> &'static str {
        SPATIAL_SOURCE
    }

    async fn fetch(&self, query: &NearbyQuery) -> Result<Vec<Event>> {
        let rows = self.store.events_within(query, self.limit).await?;
        let fetched = rows.len();
        // Re-measured so membership never depends on the store's metric
        let events = within_radius(rows, query);
        debug!(
            "Spatial store returned {} rows, {} within {} km",
            fetched,
            events.len(),
            query.radius_km
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that ignores the radius, like a bounding-box prefilter would.
    struct BoxStore {
        rows: Vec<Event>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpatialStore for BoxStore {
        async fn events_within(&self, _query: &NearbyQuery, limit: usize) -> Result<Vec<Event>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.iter().take(limit).cloned().collect())
        }
    }

    fn at(id: &str, latitude: f64, longitude: f64) -> Event {
        Event {
            id: id.to_string(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            distance_km: Some(0.0),
            ..Event::default()
        }
    }

    #[tokio::test]
    async fn test_corner_rows_are_dropped() {
        let center = GeoPoint::new(48.8566, 2.3522);
        let query = NearbyQuery::new(
            Some(center),
            5.0,
            30,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap();
        let corner = crate::geo::bounding_box(center, 5.0).north_east;
        let store = Arc::new(BoxStore {
            rows: vec![
                at("corner", corner.latitude, corner.longitude),
                at("inside", 48.8600, 2.3500),
            ],
            calls: AtomicUsize::new(0),
        });

        let adapter = SpatialAdapter::new(store.clone());
        let events = adapter.fetch(&query).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "inside");
        assert!(events[0].distance_km.unwrap() > 0.0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}

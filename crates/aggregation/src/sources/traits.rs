use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Event, NearbyQuery};

/// One upstream source translated into the shared [`Event`] shape.
///
/// Implementations return events that have coordinates, lie within the
/// query radius (great-circle), carry `distance_km`, and are ordered by
/// `(distance_km, start)`. Deadlines are enforced by the scheduler.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Key of this source in per-source counts (`"spatial"`, `"agenda"`...).
    fn id(&self) -> &'static str;

    async fn fetch(&self, query: &NearbyQuery) -> Result<Vec<Event>>;
}

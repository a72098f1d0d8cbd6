//! Persisted event pool consulted by the write path.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::matcher::{
    plan_submission, DeduplicationMatcher, SubmissionPlan, SubmitAction, SubmitOutcome,
};
use crate::cache::{Clock, SystemClock};
use crate::errors::Result;
use crate::geo::{bounding_box, haversine_km};
use crate::models::{Event, NearbyQuery};
use crate::sources::spatial::SpatialStore;

/// A pool row: the event plus bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub event: Event,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Multi-writer store of submitted events.
///
/// `submit` runs the hash short-circuit, the fuzzy match and the resulting
/// insert or replace as one serialized unit, so two concurrent submissions
/// of the same occurrence cannot both insert.
#[async_trait]
pub trait EventPool: Send + Sync {
    async fn submit(
        &self,
        event: Event,
        content_hash: String,
        matcher: &DeduplicationMatcher,
    ) -> Result<SubmitOutcome>;

    async fn get(&self, id: &str) -> Result<Option<StoredEvent>>;

    /// Marks a row deleted. Returns false if no live row has this id.
    async fn soft_delete(&self, id: &str) -> Result<bool>;
}

/// Applies a plan to `event`: new UUIDv7 id on insert, kept id on replace.
pub fn apply_plan(plan: &SubmissionPlan, mut event: Event) -> (SubmitAction, Event) {
    event.distance_km = None;
    match plan {
        SubmissionPlan::Insert => {
            event.id = Uuid::now_v7().to_string();
            (SubmitAction::Inserted, event)
        }
        SubmissionPlan::Replace { id } => {
            event.id = id.clone();
            (SubmitAction::Replaced, event)
        }
    }
}

/// Event pool held in memory. Writes are serialized by a single mutex.
pub struct InMemoryEventPool {
    rows: Mutex<Vec<StoredEvent>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryEventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventPool {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<StoredEvent>> {
        self.rows.lock().unwrap_or_else(|poisoned| {
            warn!("Event pool mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.rows().iter().filter(|row| row.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventPool for InMemoryEventPool {
    async fn submit(
        &self,
        event: Event,
        content_hash: String,
        matcher: &DeduplicationMatcher,
    ) -> Result<SubmitOutcome> {
        let now = self.clock.now();
        let mut rows = self.rows();
        let plan = plan_submission(matcher, &event, &content_hash, &rows)?;
        let (action, event) = apply_plan(&plan, event);
        let id = event.id.clone();

        match rows.iter_mut().find(|row| row.event.id == id) {
            Some(row) => {
                row.event = event;
                row.content_hash = content_hash;
                row.updated_at = now;
            }
            None => rows.push(StoredEvent {
                event,
                content_hash,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            }),
        }
        debug!("Submission {:?} as {}", action, id);
        Ok(SubmitOutcome { action, id })
    }

    async fn get(&self, id: &str) -> Result<Option<StoredEvent>> {
        Ok(self.rows().iter().find(|row| row.event.id == id).cloned())
    }

    async fn soft_delete(&self, id: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut rows = self.rows();
        match rows.iter_mut().find(|row| row.event.id == id && row.is_live()) {
            Some(row) => {
                row.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SpatialStore for InMemoryEventPool {
    async fn events_within(&self, query: &NearbyQuery, limit: usize) -> Result<Vec<Event>> {
        let bbox = bounding_box(query.center, query.radius_km);
        let mut events: Vec<Event> = self
            .rows()
            .iter()
            .filter(|row| row.is_live() && row.event.overlaps(&query.window))
            .filter_map(|row| {
                let point = row.event.point()?;
                if !bbox.contains(point) {
                    return None;
                }
                let distance = haversine_km(query.center, point);
                (distance <= query.radius_km).then(|| Event {
                    distance_km: Some(distance),
                    ..row.event.clone()
                })
            })
            .collect();
        events.sort_by(Event::cmp_distance_then_start);
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::dedup::content_hash;
    use crate::errors::DiscoveryError;
    use crate::models::GeoPoint;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, 20, 0, 0).unwrap()
    }

    fn scan(title: &str, latitude: f64) -> Event {
        Event {
            title: title.to_string(),
            city: Some("Paris".to_string()),
            start: Some(at(25)),
            latitude: Some(latitude),
            longitude: Some(2.3522),
            source_name: "submission".to_string(),
            ..Event::default()
        }
    }

    async fn submit(pool: &InMemoryEventPool, event: Event) -> Result<SubmitOutcome> {
        let hash = content_hash(&event);
        pool.submit(event, hash, &DeduplicationMatcher::default()).await
    }

    #[tokio::test]
    async fn test_insert_then_replace_keeps_id() {
        let clock = Arc::new(ManualClock::new(at(1)));
        let pool = InMemoryEventPool::with_clock(clock.clone());

        let first = submit(&pool, scan("Nuit Blanche Paris", 48.8566)).await.unwrap();
        assert_eq!(first.action, SubmitAction::Inserted);

        clock.advance(Duration::hours(2));
        let mut better = scan("Nuit Blanche à Paris", 48.8570);
        better.description = Some("Parcours nocturne".to_string());
        let second = submit(&pool, better).await.unwrap();
        assert_eq!(second.action, SubmitAction::Replaced);
        assert_eq!(second.id, first.id);
        assert_eq!(pool.len(), 1);

        let row = pool.get(&first.id).await.unwrap().unwrap();
        assert_eq!(row.event.description.as_deref(), Some("Parcours nocturne"));
        assert_eq!(row.created_at, at(1));
        assert_eq!(row.updated_at, at(1) + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_identical_payload_rejected() {
        let pool = InMemoryEventPool::new();
        let first = submit(&pool, scan("Nuit Blanche", 48.8566)).await.unwrap();
        match submit(&pool, scan("Nuit Blanche", 48.8566)).await {
            Err(DiscoveryError::DuplicateContent { existing_id }) => assert_eq!(existing_id, first.id),
            other => panic!("expected duplicate content, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_not_matched() {
        let pool = InMemoryEventPool::new();
        let first = submit(&pool, scan("Nuit Blanche", 48.8566)).await.unwrap();
        assert!(pool.soft_delete(&first.id).await.unwrap());
        assert!(!pool.soft_delete(&first.id).await.unwrap());

        let again = submit(&pool, scan("Nuit Blanche", 48.8566)).await.unwrap();
        assert_eq!(again.action, SubmitAction::Inserted);
        assert_ne!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_insert_once() {
        let pool = Arc::new(InMemoryEventPool::new());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let mut event = scan("Nuit Blanche Paris", 48.8566);
                    event.description = Some(format!("variant {}", i));
                    submit(&pool, event).await
                })
            })
            .collect();

        let mut inserted = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().action == SubmitAction::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_spatial_queries_over_live_rows() {
        let pool = InMemoryEventPool::new();
        submit(&pool, scan("Concert", 48.8600)).await.unwrap();
        let gone = submit(&pool, scan("Exposition", 48.8570)).await.unwrap();
        submit(&pool, scan("Théâtre", 49.5000)).await.unwrap();
        pool.soft_delete(&gone.id).await.unwrap();

        let query = NearbyQuery::new(
            Some(GeoPoint::new(48.8566, 2.3522)),
            5.0,
            30,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap();
        let events = pool.events_within(&query, 500).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Concert");
        assert!(events[0].distance_km.unwrap() < 1.0);
    }
}

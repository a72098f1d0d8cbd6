use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveTime, TimeZone, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, info};

use gedeon_aggregation::cache::{Clock, SystemClock};
use gedeon_aggregation::dedup::{apply_plan, city_key, plan_submission, SubmissionPlan};
use gedeon_aggregation::geo::{bounding_box, haversine_km};
use gedeon_aggregation::sources::spatial::{ListingRecord, SpatialStore};
use gedeon_aggregation::{
    content_hash, DeduplicationMatcher, DiscoveryError, Event, EventPool, NearbyQuery, Result,
    StoredEvent, SubmitOutcome,
};

use super::model::{
    format_timestamp, CityCount, EventContentDB, EventDB, EventStats, ImportSummary,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoDiscovery, StorageError};
use crate::schema::events;

/// Event pool and listing store backed by SQLite.
///
/// Reads go through the connection pool; every write goes through the
/// writer actor.
pub struct EventRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    clock: Arc<dyn Clock>,
}

impl EventRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self::with_clock(pool, writer, SystemClock::shared())
    }

    pub fn with_clock(pool: Arc<DbPool>, writer: WriteHandle, clock: Arc<dyn Clock>) -> Self {
        EventRepository {
            pool,
            writer,
            clock,
        }
    }

    /// Inserts or refreshes listings by id. Records without an id or title
    /// are skipped. Soft-deleted rows stay deleted.
    pub async fn import_listings(&self, records: Vec<ListingRecord>) -> Result<ImportSummary> {
        let now = self.clock.now();
        let (valid, invalid): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| !r.id.trim().is_empty() && !r.title.trim().is_empty());
        let skipped = invalid.len();

        let upserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut upserted = 0;
                for record in valid {
                    let event = record.into_event();
                    let hash = content_hash(&event);
                    let content = EventContentDB::new(event.clone(), hash.clone(), now);
                    let row = EventDB::from(StoredEvent {
                        event,
                        content_hash: hash,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    });
                    upserted += diesel::insert_into(events::table)
                        .values(&row)
                        .on_conflict(events::id)
                        .do_update()
                        .set(&content)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(upserted)
            })
            .await?;

        info!("Imported {} listings, skipped {}", upserted, skipped);
        Ok(ImportSummary { upserted, skipped })
    }

    pub fn stats(&self) -> Result<EventStats> {
        let mut conn = get_connection(&self.pool)?;
        let today = self.clock.now().date_naive();
        let midnight = format_timestamp(Utc.from_utc_datetime(&today.and_time(NaiveTime::MIN)));

        let total = events::table
            .filter(events::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)
            .into_discovery()?;
        let upcoming = events::table
            .filter(events::deleted_at.is_null())
            .filter(events::start_at.ge(midnight))
            .count()
            .get_result::<i64>(&mut conn)
            .into_discovery()?;
        let top_cities = events::table
            .filter(events::deleted_at.is_null())
            .filter(events::city.is_not_null())
            .group_by(events::city)
            .select((events::city, count_star()))
            .order_by(count_star().desc())
            .limit(10)
            .load::<(Option<String>, i64)>(&mut conn)
            .into_discovery()?
            .into_iter()
            .filter_map(|(city, count)| city.map(|city| CityCount { city, count }))
            .collect();

        Ok(EventStats {
            total,
            upcoming,
            top_cities,
        })
    }
}

/// Live rows the matcher could pair with `event`: same content hash, same
/// city key or inside the same-place box.
fn dedup_candidates(
    conn: &mut SqliteConnection,
    event: &Event,
    hash: &str,
    matcher: &DeduplicationMatcher,
) -> Result<Vec<StoredEvent>> {
    let mut rows: BTreeMap<String, EventDB> = BTreeMap::new();
    let mut keep = |found: Vec<EventDB>| {
        for row in found {
            rows.entry(row.id.clone()).or_insert(row);
        }
    };

    keep(
        events::table
            .filter(events::deleted_at.is_null())
            .filter(events::content_hash.eq(hash))
            .select(EventDB::as_select())
            .load(conn)
            .map_err(StorageError::from)?,
    );

    if let Some(key) = event.city.as_deref().and_then(city_key) {
        keep(
            events::table
                .filter(events::deleted_at.is_null())
                .filter(events::city_key.eq(key))
                .select(EventDB::as_select())
                .load(conn)
                .map_err(StorageError::from)?,
        );
    }

    if let Some(point) = event.point() {
        let bbox = bounding_box(point, matcher.config().same_place_radius_km);
        keep(
            events::table
                .filter(events::deleted_at.is_null())
                .filter(events::latitude.between(bbox.south_west.latitude, bbox.north_east.latitude))
                .filter(
                    events::longitude.between(bbox.south_west.longitude, bbox.north_east.longitude),
                )
                .select(EventDB::as_select())
                .load(conn)
                .map_err(StorageError::from)?,
        );
    }

    rows.into_values()
        .map(|row| StoredEvent::try_from(row).map_err(DiscoveryError::from))
        .collect()
}

#[async_trait]
impl EventPool for EventRepository {
    async fn submit(
        &self,
        event: Event,
        content_hash: String,
        matcher: &DeduplicationMatcher,
    ) -> Result<SubmitOutcome> {
        let matcher = *matcher;
        let now = self.clock.now();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SubmitOutcome> {
                let rows = dedup_candidates(conn, &event, &content_hash, &matcher)?;
                let plan = plan_submission(&matcher, &event, &content_hash, &rows)?;
                let (action, event) = apply_plan(&plan, event);
                let id = event.id.clone();

                match plan {
                    SubmissionPlan::Replace { .. } => {
                        diesel::update(events::table.find(&id))
                            .set(&EventContentDB::new(event, content_hash, now))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    SubmissionPlan::Insert => {
                        let row = EventDB::from(StoredEvent {
                            event,
                            content_hash,
                            created_at: now,
                            updated_at: now,
                            deleted_at: None,
                        });
                        diesel::insert_into(events::table)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                debug!("Submission {:?} as {}", action, id);
                Ok(SubmitOutcome { action, id })
            })
            .await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredEvent>> {
        let mut conn = get_connection(&self.pool)?;
        let row = events::table
            .find(id)
            .select(EventDB::as_select())
            .first::<EventDB>(&mut conn)
            .optional()
            .into_discovery()?;
        row.map(StoredEvent::try_from)
            .transpose()
            .map_err(DiscoveryError::from)
    }

    async fn soft_delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let now = format_timestamp(self.clock.now());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let updated = diesel::update(
                    events::table
                        .filter(events::id.eq(&id))
                        .filter(events::deleted_at.is_null()),
                )
                .set((
                    events::deleted_at.eq(Some(now.clone())),
                    events::updated_at.eq(now),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(updated > 0)
            })
            .await
    }
}

#[async_trait]
impl SpatialStore for EventRepository {
    /// Temporal and bounding-box prefilter in SQL, great-circle membership
    /// and ordering in Rust.
    async fn events_within(&self, query: &NearbyQuery, limit: usize) -> Result<Vec<Event>> {
        let mut conn = get_connection(&self.pool)?;
        let bbox = bounding_box(query.center, query.radius_km);
        let window_start = format_timestamp(query.window.starts_at());
        let window_end = format_timestamp(query.window.ends_at());

        let rows = events::table
            .filter(events::deleted_at.is_null())
            .filter(events::end_at.is_null().or(events::end_at.ge(window_start)))
            .filter(events::start_at.is_null().or(events::start_at.le(window_end)))
            .filter(events::latitude.between(bbox.south_west.latitude, bbox.north_east.latitude))
            .filter(events::longitude.between(bbox.south_west.longitude, bbox.north_east.longitude))
            .select(EventDB::as_select())
            .load::<EventDB>(&mut conn)
            .into_discovery()?;
        let prefiltered = rows.len();

        let mut found = Vec::with_capacity(prefiltered);
        for row in rows {
            let mut event = StoredEvent::try_from(row)?.event;
            let Some(point) = event.point() else {
                continue;
            };
            let distance = haversine_km(query.center, point);
            if distance <= query.radius_km {
                event.distance_km = Some(distance);
                found.push(event);
            }
        }
        found.sort_by(Event::cmp_distance_then_start);
        found.truncate(limit);

        debug!(
            "Spatial query kept {} of {} prefiltered rows",
            found.len(),
            prefiltered
        );
        Ok(found)
    }
}

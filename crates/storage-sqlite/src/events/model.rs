//! Database models for events.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use gedeon_aggregation::dedup::city_key;
use gedeon_aggregation::{Event, StoredEvent};
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// Timestamps are stored as RFC 3339 UTC text with a `Z` suffix so that
/// lexical order is chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidValue(format!("timestamp '{}': {}", raw, e)))
}

fn parse_optional(raw: Option<String>) -> std::result::Result<Option<DateTime<Utc>>, StorageError> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// Database model for events
#[derive(
    Queryable, Identifiable, Insertable, Selectable, PartialEq, Serialize, Deserialize, Debug, Clone,
)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct EventDB {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub organizer: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    /// Trimmed, Unicode-lowercased `city`; SQLite's `lower()` only folds ASCII.
    pub city_key: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source_name: String,
    pub source_url: Option<String>,
    pub content_hash: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// Content update of an existing row. Identity, creation time and deletion
/// state are left untouched; absent fields are written as NULL.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::events)]
#[diesel(treat_none_as_null = true)]
pub struct EventContentDB {
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub organizer: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub city_key: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source_name: String,
    pub source_url: Option<String>,
    pub content_hash: String,
    pub updated_at: String,
}

impl EventContentDB {
    pub fn new(event: Event, content_hash: String, updated_at: DateTime<Utc>) -> Self {
        Self {
            title: event.title,
            category: event.category,
            description: event.description,
            organizer: event.organizer,
            start_at: event.start.map(format_timestamp),
            end_at: event.end.map(format_timestamp),
            venue_name: event.venue_name,
            address: event.address,
            city_key: event.city.as_deref().and_then(city_key),
            city: event.city,
            postal_code: event.postal_code,
            latitude: event.latitude,
            longitude: event.longitude,
            source_name: event.source_name,
            source_url: event.source_url,
            content_hash,
            updated_at: format_timestamp(updated_at),
        }
    }
}

impl From<StoredEvent> for EventDB {
    fn from(stored: StoredEvent) -> Self {
        let event = stored.event;
        Self {
            id: event.id,
            title: event.title,
            category: event.category,
            description: event.description,
            organizer: event.organizer,
            start_at: event.start.map(format_timestamp),
            end_at: event.end.map(format_timestamp),
            venue_name: event.venue_name,
            address: event.address,
            city_key: event.city.as_deref().and_then(city_key),
            city: event.city,
            postal_code: event.postal_code,
            latitude: event.latitude,
            longitude: event.longitude,
            source_name: event.source_name,
            source_url: event.source_url,
            content_hash: stored.content_hash,
            created_at: format_timestamp(stored.created_at),
            updated_at: format_timestamp(stored.updated_at),
            deleted_at: stored.deleted_at.map(format_timestamp),
        }
    }
}

impl TryFrom<EventDB> for StoredEvent {
    type Error = StorageError;

    fn try_from(db: EventDB) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            event: Event {
                id: db.id,
                title: db.title,
                category: db.category,
                description: db.description,
                organizer: db.organizer,
                start: parse_optional(db.start_at)?,
                end: parse_optional(db.end_at)?,
                venue_name: db.venue_name,
                address: db.address,
                city: db.city,
                postal_code: db.postal_code,
                latitude: db.latitude,
                longitude: db.longitude,
                distance_km: None,
                source_name: db.source_name,
                source_url: db.source_url,
            },
            content_hash: db.content_hash,
            created_at: parse_timestamp(&db.created_at)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            deleted_at: parse_optional(db.deleted_at)?,
        })
    }
}

/// Row count per city, as reported by the stats query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityCount {
    pub city: String,
    pub count: i64,
}

/// Pool summary: live rows, upcoming rows and the busiest cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total: i64,
    pub upcoming: i64,
    pub top_cities: Vec<CityCount>,
}

/// Outcome of a bulk listing import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub upserted: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = format_timestamp(Utc.with_ymd_and_hms(2026, 9, 30, 23, 0, 0).unwrap());
        let later = format_timestamp(Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap());
        assert_eq!(earlier, "2026-09-30T23:00:00Z");
        assert!(earlier < later);
    }

    #[test]
    fn test_row_conversion_keeps_bookkeeping() {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap();
        let stored = StoredEvent {
            event: Event {
                id: "e1".to_string(),
                title: "Nuit Blanche".to_string(),
                start: Some(at),
                latitude: Some(48.85),
                longitude: Some(2.35),
                source_name: "submission".to_string(),
                ..Event::default()
            },
            content_hash: "abc".to_string(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };

        let row = EventDB::from(stored.clone());
        assert_eq!(row.start_at.as_deref(), Some("2026-10-01T08:00:00Z"));
        assert_eq!(StoredEvent::try_from(row).unwrap(), stored);
    }

    #[test]
    fn test_corrupt_timestamp_is_reported() {
        let row = EventDB {
            id: "e1".to_string(),
            title: "x".to_string(),
            category: None,
            description: None,
            organizer: None,
            start_at: Some("yesterday".to_string()),
            end_at: None,
            venue_name: None,
            address: None,
            city: None,
            city_key: None,
            postal_code: None,
            latitude: None,
            longitude: None,
            source_name: "spatial".to_string(),
            source_url: None,
            content_hash: "h".to_string(),
            created_at: "2026-10-01T08:00:00Z".to_string(),
            updated_at: "2026-10-01T08:00:00Z".to_string(),
            deleted_at: None,
        };
        assert!(matches!(
            StoredEvent::try_from(row),
            Err(StorageError::InvalidValue(_))
        ));
    }
}

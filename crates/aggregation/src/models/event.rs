use std::cmp::Ordering;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::geo::{GeoPoint, GeoQuery};
use crate::errors::{DiscoveryError, Result};

/// Normalized listing produced by every source adapter.
///
/// Coordinates are optional until resolved. `distance_km` is derived from the
/// request center and never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Empty on a new submission; assigned by the event pool.
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub organizer: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub source_name: String,
    pub source_url: Option<String>,
}

impl Event {
    /// Resolved coordinates, if both components are present.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn set_point(&mut self, point: GeoPoint) {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
    }

    /// Geocoding query describing this event's venue.
    pub fn geo_query(&self) -> GeoQuery {
        GeoQuery::for_venue(
            self.venue_name.as_deref(),
            self.address.as_deref(),
            self.city.as_deref(),
            self.postal_code.as_deref(),
        )
    }

    /// True when the validity window `[start, end]` overlaps `window`.
    /// Open-ended bounds overlap everything on their side.
    pub fn overlaps(&self, window: &DateWindow) -> bool {
        let ends_after_start = self.end.map_or(true, |end| end >= window.starts_at());
        let starts_before_end = self.start.map_or(true, |start| start <= window.ends_at());
        ends_after_start && starts_before_end
    }

    /// Result ordering: `(distance_km, start)` ascending, missing values last.
    pub fn cmp_distance_then_start(&self, other: &Self) -> Ordering {
        let by_distance = match (self.distance_km, other.distance_km) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_distance.then_with(|| match (self.start, other.start) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
    }
}

/// Inclusive calendar window `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `[today, today + horizon_days]`, or `None` past the last
    /// representable date.
    pub fn from_today(today: NaiveDate, horizon_days: u32) -> Option<Self> {
        let end = today.checked_add_days(Days::new(u64::from(horizon_days)))?;
        Some(Self { start: today, end })
    }

    /// Midnight UTC at the start of the window.
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Last second of the window's final day, UTC.
    pub fn ends_at(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.end.and_time(last))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Validated read request: center, radius and date window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub window: DateWindow,
}

impl NearbyQuery {
    /// Validates the request. A missing or out-of-range center, or a
    /// non-positive radius, is the only hard client error.
    pub fn new(
        center: Option<GeoPoint>,
        radius_km: f64,
        horizon_days: u32,
        today: NaiveDate,
    ) -> Result<Self> {
        let center = center
            .ok_or_else(|| DiscoveryError::InvalidRequest("center is required".to_string()))?;
        if !center.is_valid() {
            return Err(DiscoveryError::InvalidRequest(format!(
                "center ({}, {}) is out of range",
                center.latitude, center.longitude
            )));
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(DiscoveryError::InvalidRequest(format!(
                "radius must be positive, got {}",
                radius_km
            )));
        }

        let window = DateWindow::from_today(today, horizon_days).ok_or_else(|| {
            DiscoveryError::InvalidRequest(format!(
                "horizon of {} days is out of range",
                horizon_days
            ))
        })?;

        Ok(Self {
            center,
            radius_km,
            window,
        })
    }
}

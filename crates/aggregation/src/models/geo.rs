use serde::{Deserialize, Serialize};

use super::types::RegionCode;
use crate::geo::{extract_postal_code, region_from_postal_code};

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Place description handed to the geocoding chain.
///
/// Every field is optional; resolution degrades gracefully as they disappear.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoQuery {
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    /// Region code the caller expects the place to be in, overriding the
    /// one derived from the postal code.
    pub region_hint: Option<RegionCode>,
    pub country: Option<String>,
    /// Coordinates attached to submitted media (photo GPS). Used only as the
    /// terminal fallback and never part of the cache key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_point: Option<GeoPoint>,
}

impl GeoQuery {
    /// Builds a query for a venue with optional address components.
    pub fn for_venue(
        venue_name: Option<&str>,
        address: Option<&str>,
        city: Option<&str>,
        postal_code: Option<&str>,
    ) -> Self {
        Self {
            venue_name: non_blank(venue_name),
            address: non_blank(address),
            city: non_blank(city),
            postal_code: non_blank(postal_code),
            region_hint: None,
            country: Some("France".to_string()),
            device_point: None,
        }
    }

    /// Attaches device coordinates used as the last-resort answer.
    pub fn with_device_point(mut self, point: Option<GeoPoint>) -> Self {
        self.device_point = point;
        self
    }

    /// True when no textual component is present.
    pub fn is_empty(&self) -> bool {
        self.venue_name.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.postal_code.is_none()
    }

    /// Exact-match cache key: normalized textual components joined by `|`.
    pub fn cache_key(&self) -> String {
        [
            &self.venue_name,
            &self.address,
            &self.city,
            &self.postal_code,
            &self.region_hint,
            &self.country,
        ]
        .iter()
        .map(|part| {
            part.as_deref()
                .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("|")
    }

    /// Postal code from the dedicated field, or the first five-digit run of
    /// the address.
    pub fn effective_postal_code(&self) -> Option<String> {
        self.postal_code
            .clone()
            .or_else(|| self.address.as_deref().and_then(extract_postal_code))
    }

    /// Region the answer is expected to fall in.
    pub fn expected_region(&self) -> Option<RegionCode> {
        self.region_hint.clone().or_else(|| {
            self.effective_postal_code()
                .as_deref()
                .and_then(region_from_postal_code)
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Which fallback tier produced a coordinate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceSource {
    /// Served from the geocoding cache.
    Cache,
    /// Fuzzy match in the curated, pre-geocoded venue catalog.
    CuratedCatalog,
    /// Hardcoded table of frequently mis-geocoded venues.
    KnownVenue,
    /// External geocoder answer that passed the regional bounding-box check.
    PlausibilityChecked,
    /// External geocoder answer that could not be checked (no expected region).
    RawExternal,
    /// Coordinates attached to the submitted media.
    DeviceMetadata,
}

impl ConfidenceSource {
    /// Curated answers are persisted so they survive restarts.
    pub fn is_curated(&self) -> bool {
        matches!(self, Self::CuratedCatalog | Self::KnownVenue)
    }
}

/// Successful geocoding answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoResult {
    pub latitude: f64,
    pub longitude: f64,
    pub confidence_source: ConfidenceSource,
    pub resolved_city: Option<String>,
    pub resolved_region_code: Option<RegionCode>,
}

impl GeoResult {
    pub fn new(point: GeoPoint, confidence_source: ConfidenceSource) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            confidence_source,
            resolved_city: None,
            resolved_region_code: None,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validity() {
        assert!(GeoPoint::new(48.8566, 2.3522).is_valid());
        assert!(!GeoPoint::new(91.0, 2.0).is_valid());
        assert!(!GeoPoint::new(48.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 2.0).is_valid());
    }

    #[test]
    fn test_cache_key_normalizes_case_and_whitespace() {
        let a = GeoQuery::for_venue(Some("Le  Grand Rex"), None, Some("Paris"), None);
        let b = GeoQuery::for_venue(Some(" le grand rex "), None, Some("PARIS"), None);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_cache_key_ignores_device_point() {
        let a = GeoQuery::for_venue(Some("MK2 Nation"), None, None, None);
        let b = a.clone().with_device_point(Some(GeoPoint::new(48.0, 2.0)));
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_expected_region_from_address() {
        let query = GeoQuery::for_venue(
            Some("Salle Pleyel"),
            Some("252 Rue du Faubourg Saint-Honoré, 75008 Paris"),
            None,
            None,
        );
        assert_eq!(query.expected_region().as_deref(), Some("75"));
    }

    #[test]
    fn test_region_hint_wins_over_postal_code() {
        let mut query = GeoQuery::for_venue(None, None, None, Some("69001"));
        query.region_hint = Some("13".to_string());
        assert_eq!(query.expected_region().as_deref(), Some("13"));
    }

    #[test]
    fn test_blank_components_are_dropped() {
        let query = GeoQuery::for_venue(Some("  "), None, Some(""), None);
        assert!(query.is_empty());
    }
}

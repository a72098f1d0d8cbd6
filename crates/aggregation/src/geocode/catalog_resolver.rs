//! Curated, pre-geocoded venue catalog and the tier that matches against it.
//!
//! The catalog file is a JSON array of
//! `{id, name, address, dept, lat, lon, source}`; entries without usable
//! coordinates are dropped at load.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Deserializer};

use super::scoring::{score_venue, MIN_VENUE_SCORE, REGION_BONUS};
use super::traits::GeocodeTier;
use crate::errors::Result;
use crate::geo::{extract_postal_code, haversine_km, region_from_postal_code};
use crate::models::{ConfidenceSource, GeoPoint, GeoQuery, GeoResult, NearbyQuery, RegionCode};

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: serde_json::Value,
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    dept: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    source: Option<String>,
}

/// Department codes appear both as `"75"` and `75` in the dataset.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| format!("{:02}", n)),
        _ => None,
    })
}

/// A geocoded venue.
#[derive(Clone, Debug, PartialEq)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub region: Option<RegionCode>,
    pub point: GeoPoint,
    pub source: Option<String>,
}

impl Venue {
    /// City part of an address of the form `"..., 75002 Paris"`.
    pub fn city(&self) -> Option<String> {
        let address = self.address.as_deref()?;
        let postal = extract_postal_code(address)?;
        let after = address.split(postal.as_str()).nth(1)?.trim();
        let city = after.split(',').next()?.trim();
        (!city.is_empty()).then(|| city.to_string())
    }
}

/// In-memory venue dataset, loaded once.
#[derive(Clone, Debug, Default)]
pub struct VenueCatalog {
    venues: Vec<Venue>,
}

impl VenueCatalog {
    pub fn from_venues(venues: Vec<Venue>) -> Self {
        Self { venues }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(raw)?;
        let total = records.len();
        let venues: Vec<Venue> = records.into_iter().filter_map(into_venue).collect();
        if venues.len() < total {
            debug!(
                "Skipped {} catalog entries without coordinates",
                total - venues.len()
            );
        }
        Ok(Self { venues })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let catalog = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!(
            "Loaded {} venues from {}",
            catalog.venues.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }

    /// Venues within `radius_km` of the query center, nearest first.
    pub fn within(&self, query: &NearbyQuery) -> Vec<(&Venue, f64)> {
        let mut found: Vec<(&Venue, f64)> = self
            .venues
            .iter()
            .map(|venue| (venue, haversine_km(query.center, venue.point)))
            .filter(|(_, distance)| *distance <= query.radius_km)
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found
    }

    /// Best-scoring venue for `name`, with its total score.
    ///
    /// Candidates must reach [`MIN_VENUE_SCORE`] on the name alone; region
    /// agreement then adds [`REGION_BONUS`] so a same-name venue in the
    /// expected department outranks its homonyms elsewhere.
    pub fn best_match(&self, name: &str, region: Option<&str>) -> Option<(&Venue, u32)> {
        self.venues
            .iter()
            .filter_map(|venue| {
                let text = score_venue(name, &venue.name);
                if text < MIN_VENUE_SCORE {
                    return None;
                }
                let bonus = match (region, venue.region.as_deref()) {
                    (Some(expected), Some(actual)) if expected == actual => REGION_BONUS,
                    _ => 0,
                };
                Some((venue, text + bonus))
            })
            // max_by_key keeps the last maximum; reverse so catalog order breaks ties
            .rev()
            .max_by_key(|(_, score)| *score)
    }
}

fn into_venue(record: CatalogRecord) -> Option<Venue> {
    let point = GeoPoint::new(record.lat?, record.lon?);
    if !point.is_valid() {
        return None;
    }
    let region = record.dept.or_else(|| {
        record
            .address
            .as_deref()
            .and_then(extract_postal_code)
            .as_deref()
            .and_then(region_from_postal_code)
    });
    let id = match record.id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    Some(Venue {
        id,
        name: record.name,
        address: record.address,
        region,
        point,
        source: record.source,
    })
}

/// Tier 2: fuzzy match against the curated catalog.
pub struct CatalogTier {
    catalog: Arc<VenueCatalog>,
}

impl CatalogTier {
    pub fn new(catalog: Arc<VenueCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl GeocodeTier for CatalogTier {
    fn id(&self) -> &'static str {
        "CATALOG"
    }

    async fn resolve(&self, query: &GeoQuery) -> Option<Result<GeoResult>> {
        let name = query.venue_name.as_deref()?;
        let region = query.expected_region();
        let (venue, score) = self.catalog.best_match(name, region.as_deref())?;
        debug!("Catalog matched '{}' to '{}' (score {})", name, venue.name, score);

        let mut result = GeoResult::new(venue.point, ConfidenceSource::CuratedCatalog);
        result.resolved_city = venue.city();
        result.resolved_region_code = venue.region.clone();
        Some(Ok(result))
    }
}

//! High-traffic venues that external geocoders routinely misplace.

use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;

use super::scoring::normalize_name;
use super::traits::GeocodeTier;
use crate::errors::Result;
use crate::models::{ConfidenceSource, GeoPoint, GeoQuery, GeoResult};

lazy_static! {
    /// Normalized venue name -> (latitude, longitude, region).
    static ref KNOWN_VENUES: HashMap<String, (f64, f64, &'static str)> = [
        ("UGC Ciné Cité Les Halles", 48.8619, 2.3466, "75"),
        ("Pathé Beaugrenelle", 48.8478, 2.2820, "75"),
        ("MK2 Bibliothèque", 48.8338, 2.3761, "75"),
        ("MK2 Quai de Seine", 48.8840, 2.3719, "75"),
        ("MK2 Nation", 48.8482, 2.3969, "75"),
        ("Gaumont Champs-Élysées", 48.8698, 2.3046, "75"),
        ("Gaumont Opéra", 48.8716, 2.3315, "75"),
        ("UGC Montparnasse", 48.8422, 2.3244, "75"),
        ("Le Grand Rex", 48.8707, 2.3477, "75"),
        ("Pathé Levallois", 48.8920, 2.2883, "92"),
        ("Pathé Boulogne", 48.8342, 2.2411, "92"),
        ("Pathé La Villette", 48.8938, 2.3889, "75"),
    ]
    .into_iter()
    .map(|(name, lat, lng, region)| (normalize_name(name), (lat, lng, region)))
    .collect();
}

/// Tier 3: hardcoded coordinates for a handful of venues.
///
/// Matches when the normalized query name equals a known name or contains
/// it (so "Cinéma Pathé Beaugrenelle Paris 15" still matches).
#[derive(Clone, Copy, Debug, Default)]
pub struct KnownVenueTier;

impl KnownVenueTier {
    pub fn new() -> Self {
        Self
    }

    fn lookup(name: &str) -> Option<(f64, f64, &'static str)> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }
        if let Some(entry) = KNOWN_VENUES.get(&normalized) {
            return Some(*entry);
        }
        // Longest known name first, so "mk2 quai de seine" beats a shorter key
        let mut contained: Vec<(&String, &(f64, f64, &'static str))> = KNOWN_VENUES
            .iter()
            .filter(|(known, _)| normalized.contains(known.as_str()))
            .collect();
        contained.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        contained.first().map(|(_, entry)| **entry)
    }
}

#[async_trait]
impl GeocodeTier for KnownVenueTier {
    fn id(&self) -> &'static str {
        "KNOWN_VENUE"
    }

    async fn resolve(&self, query: &GeoQuery) -> Option<Result<GeoResult>> {
        let (latitude, longitude, region) = Self::lookup(query.venue_name.as_deref()?)?;
        let mut result = GeoResult::new(
            GeoPoint::new(latitude, longitude),
            ConfidenceSource::KnownVenue,
        );
        result.resolved_region_code = Some(region.to_string());
        Some(Ok(result))
    }
}

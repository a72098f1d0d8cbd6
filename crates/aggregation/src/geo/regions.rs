//! Administrative regions (French departments) and their plausibility boxes.
//!
//! The table is hand-maintained and deliberately partial: it covers the
//! high-traffic departments where geocoders most often return a homonym from
//! another region. Regions absent from the table yield
//! [`Plausibility::UnknownRegion`]; what to do with those is a policy decision
//! taken by the caller.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::distance::BoundingBox;
use crate::models::{GeoPoint, RegionCode};

lazy_static! {
    static ref POSTAL_CODE_RE: Regex = Regex::new(r"\b(\d{5})\b").expect("valid postal code regex");
}

/// Default per-region bounds `(code, min_lat, min_lng, max_lat, max_lng)`.
const DEFAULT_REGIONS: &[(&str, f64, f64, f64, f64)] = &[
    ("75", 48.815, 2.224, 48.902, 2.470),
    ("92", 48.729, 2.146, 48.951, 2.337),
    ("93", 48.807, 2.288, 49.012, 2.603),
    ("94", 48.688, 2.308, 48.862, 2.616),
    ("77", 48.120, 2.392, 49.118, 3.559),
    ("78", 48.438, 1.446, 49.085, 2.229),
    ("91", 48.284, 1.914, 48.776, 2.586),
    ("95", 48.908, 1.608, 49.241, 2.594),
    ("69", 45.454, 4.243, 46.304, 5.160),
    ("13", 43.160, 4.230, 43.925, 5.814),
    ("33", 44.193, -1.262, 45.574, 0.315),
    ("31", 42.689, 0.442, 43.920, 2.048),
    ("35", 47.631, -2.290, 48.714, -1.016),
    ("44", 46.860, -2.558, 47.834, -0.959),
    ("59", 49.969, 2.068, 51.089, 4.231),
    ("67", 48.120, 6.940, 49.078, 8.233),
    ("06", 43.480, 6.637, 44.361, 7.718),
    ("34", 43.213, 2.540, 43.969, 4.194),
    ("2A", 41.333, 8.535, 42.382, 9.413),
    ("2B", 41.833, 8.573, 43.028, 9.560),
    ("974", -21.390, 55.216, -20.872, 55.837),
];

/// First five-digit run of a free-text address.
pub fn extract_postal_code(text: &str) -> Option<String> {
    POSTAL_CODE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Region code for a French postal code.
///
/// Corsica (`20xxx`) splits into `2A` below 20200 and `2B` above; overseas
/// departments (`97x`) keep three digits.
pub fn region_from_postal_code(postal_code: &str) -> Option<RegionCode> {
    let code = postal_code.trim();
    if code.len() != 5 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    if code.starts_with("20") {
        let numeric: u32 = code.parse().ok()?;
        return Some(if numeric < 20200 { "2A" } else { "2B" }.to_string());
    }
    if code.starts_with("97") || code.starts_with("98") {
        return Some(code[..3].to_string());
    }
    Some(code[..2].to_string())
}

/// Outcome of checking a point against a region's box.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Plausibility {
    /// Inside the region box widened by the margin.
    Inside,
    /// Outside the widened box: the answer is a homonym elsewhere.
    Outside,
    /// The region has no entry in the table.
    UnknownRegion,
}

/// Per-region bounding boxes used to validate external geocoder answers.
#[derive(Clone, Debug)]
pub struct RegionTable {
    boxes: HashMap<RegionCode, BoundingBox>,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionTable {
    /// Table loaded with the default French departments.
    pub fn new() -> Self {
        let boxes = DEFAULT_REGIONS
            .iter()
            .map(|(code, min_lat, min_lng, max_lat, max_lng)| {
                (
                    code.to_string(),
                    BoundingBox::from_bounds(*min_lat, *min_lng, *max_lat, *max_lng),
                )
            })
            .collect();
        Self { boxes }
    }

    /// Empty table; every region is unknown.
    pub fn empty() -> Self {
        Self {
            boxes: HashMap::new(),
        }
    }

    /// Adds or replaces a region box.
    pub fn insert(&mut self, code: impl Into<RegionCode>, bbox: BoundingBox) {
        self.boxes.insert(code.into(), bbox);
    }

    pub fn get(&self, code: &str) -> Option<&BoundingBox> {
        self.boxes.get(code)
    }

    /// Checks `point` against the box of `region` widened by `margin_km`.
    pub fn check(&self, region: &str, point: GeoPoint, margin_km: f64) -> Plausibility {
        match self.boxes.get(region) {
            Some(bbox) if bbox.expand_km(margin_km).contains(point) => Plausibility::Inside,
            Some(_) => Plausibility::Outside,
            None => Plausibility::UnknownRegion,
        }
    }

    /// First region whose (unwidened) box contains the point.
    pub fn locate(&self, point: GeoPoint) -> Option<&str> {
        let mut matches: Vec<&str> = self
            .boxes
            .iter()
            .filter(|(_, bbox)| bbox.contains(point))
            .map(|(code, _)| code.as_str())
            .collect();
        // Boxes overlap around Paris; the smallest code wins for determinism
        matches.sort_unstable();
        matches.first().copied()
    }
}

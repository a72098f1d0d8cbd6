use log::debug;
use serde::{Deserialize, Serialize};

use super::pool::StoredEvent;
use super::similarity::{normalize_title, title_similarity, DedupConfig};
use crate::errors::{DiscoveryError, Result};
use crate::geo::haversine_km;
use crate::models::{Event, GeoPoint};

/// Comparison key of a city name: trimmed and Unicode-lowercased.
pub fn city_key(city: &str) -> Option<String> {
    let key = city.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

/// Matching view of an event. Derived on demand, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct DedupCandidate {
    pub normalized_title: String,
    pub city: Option<String>,
    pub point: Option<GeoPoint>,
}

impl DedupCandidate {
    pub fn from_event(event: &Event) -> Self {
        Self {
            normalized_title: normalize_title(&event.title),
            city: event.city.as_deref().and_then(city_key),
            point: event.point(),
        }
    }
}

/// Decides whether a submission describes an event already in the pool.
///
/// Same occurrence means: identical normalized titles or similarity at or
/// above the threshold, and the same city (case-insensitive) or a
/// great-circle distance under the same-place radius.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeduplicationMatcher {
    config: DedupConfig,
}

impl DeduplicationMatcher {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Title similarity if `a` and `b` are the same occurrence.
    pub fn match_score(&self, a: &DedupCandidate, b: &DedupCandidate) -> Option<f64> {
        let similarity = title_similarity(&a.normalized_title, &b.normalized_title);
        if similarity < self.config.title_threshold {
            return None;
        }

        let same_city = matches!((&a.city, &b.city), (Some(x), Some(y)) if x == y);
        let nearby = match (a.point, b.point) {
            (Some(p), Some(q)) => haversine_km(p, q) < self.config.same_place_radius_km,
            _ => false,
        };
        (same_city || nearby).then_some(similarity)
    }

    /// Best live match for `candidate` in `pool`. Soft-deleted rows are never
    /// considered; ties keep the earliest row.
    pub fn find_duplicate<'a>(
        &self,
        candidate: &Event,
        pool: &'a [StoredEvent],
    ) -> Option<&'a StoredEvent> {
        let wanted = DedupCandidate::from_event(candidate);
        let mut best: Option<(&StoredEvent, f64)> = None;
        for stored in pool.iter().filter(|stored| stored.is_live()) {
            let Some(score) = self.match_score(&wanted, &DedupCandidate::from_event(&stored.event))
            else {
                continue;
            };
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((stored, score));
            }
        }
        best.map(|(stored, score)| {
            debug!(
                "'{}' matches stored event {} ({:.2})",
                candidate.title, stored.event.id, score
            );
            stored
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitAction {
    Inserted,
    Replaced,
}

/// Result of a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub action: SubmitAction,
    pub id: String,
}

/// What a pool should do with a submission, decided against its live rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionPlan {
    Insert,
    /// Supersede the row with this id, keeping the id.
    Replace { id: String },
}

/// Hash short-circuit, then fuzzy match.
///
/// `rows` must hold every live row sharing `content_hash` and every live
/// row the matcher could pair with `candidate`; pools may prefilter by city
/// and proximity.
pub fn plan_submission(
    matcher: &DeduplicationMatcher,
    candidate: &Event,
    content_hash: &str,
    rows: &[StoredEvent],
) -> Result<SubmissionPlan> {
    if let Some(existing) = rows
        .iter()
        .find(|row| row.is_live() && row.content_hash == content_hash)
    {
        return Err(DiscoveryError::DuplicateContent {
            existing_id: existing.event.id.clone(),
        });
    }

    Ok(match matcher.find_duplicate(candidate, rows) {
        Some(stored) => SubmissionPlan::Replace {
            id: stored.event.id.clone(),
        },
        None => SubmissionPlan::Insert,
    })
}

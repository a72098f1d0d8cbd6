//! External geocoder tier with regional plausibility checks.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::nominatim::{GeocodedPlace, GeocodingService};
use super::traits::GeocodeTier;
use crate::errors::{DiscoveryError, Result};
use crate::geo::{Plausibility, RegionTable};
use crate::models::{ConfidenceSource, GeoQuery, GeoResult};

/// Default widening of a region box before checking an answer against it.
pub const DEFAULT_PLAUSIBILITY_MARGIN_KM: f64 = 50.0;

/// What to do with an answer whose expected region has no box in the
/// [`RegionTable`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnknownRegionPolicy {
    /// Accept, tagged [`ConfidenceSource::RawExternal`]. A region code
    /// reported by the geocoder that contradicts the expected one is still
    /// rejected.
    #[default]
    Accept,
    /// Reject until the region is added to the table.
    Reject,
}

impl FromStr for UnknownRegionPolicy {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(DiscoveryError::InvalidRequest(format!(
                "unknown region policy '{}' (expected accept or reject)",
                other
            ))),
        }
    }
}

/// Settings of the external tier.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeConfig {
    pub plausibility_margin_km: f64,
    pub unknown_region_policy: UnknownRegionPolicy,
    pub negative_ttl: std::time::Duration,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            plausibility_margin_km: DEFAULT_PLAUSIBILITY_MARGIN_KM,
            unknown_region_policy: UnknownRegionPolicy::Accept,
            negative_ttl: crate::cache::DEFAULT_NEGATIVE_TTL,
        }
    }
}

/// Tier 4: external geocoder tried with progressively less specific queries.
///
/// The ladder is full address with venue, then venue and city, then address
/// and city, then postal code and country. Every answer is checked against
/// the expected region's box widened by the margin; an implausible answer
/// moves on to the next rung.
pub struct ExternalTier {
    service: Arc<dyn GeocodingService>,
    regions: Arc<RegionTable>,
    margin_km: f64,
    policy: UnknownRegionPolicy,
}

impl ExternalTier {
    pub fn new(service: Arc<dyn GeocodingService>, regions: Arc<RegionTable>) -> Self {
        Self {
            service,
            regions,
            margin_km: DEFAULT_PLAUSIBILITY_MARGIN_KM,
            policy: UnknownRegionPolicy::default(),
        }
    }

    pub fn with_config(mut self, config: &GeocodeConfig) -> Self {
        self.margin_km = config.plausibility_margin_km;
        self.policy = config.unknown_region_policy;
        self
    }

    /// Query texts from most to least specific, without duplicates.
    pub fn query_ladder(query: &GeoQuery) -> Vec<String> {
        let venue = query.venue_name.as_deref();
        let address = query.address.as_deref();
        let city = query.city.as_deref();
        let postal = query.effective_postal_code();
        let country = query.country.as_deref();

        let locality = join(&[postal.as_deref(), city]);
        let candidates = [
            venue.and(address).map(|_| join(&[venue, address, locality.as_deref(), country])),
            venue.and(city).map(|_| join(&[venue, city, country])),
            address.map(|_| join(&[address, locality.as_deref(), country])),
            postal.as_deref().map(|_| join(&[postal.as_deref(), country])),
        ];

        let mut ladder: Vec<String> = Vec::new();
        for text in candidates.into_iter().flatten().flatten() {
            if !ladder.contains(&text) {
                ladder.push(text);
            }
        }
        ladder
    }

    /// Decides whether `place` is an acceptable answer for `query`.
    fn judge(&self, query: &GeoQuery, place: &GeocodedPlace) -> Result<ConfidenceSource> {
        let Some(expected) = query.expected_region() else {
            return Ok(ConfidenceSource::RawExternal);
        };

        match self.regions.check(&expected, place.point, self.margin_km) {
            Plausibility::Inside => Ok(ConfidenceSource::PlausibilityChecked),
            Plausibility::Outside => Err(DiscoveryError::ImplausibleResult { region: expected }),
            Plausibility::UnknownRegion => {
                let contradicts = place
                    .region_code
                    .as_deref()
                    .is_some_and(|reported| reported != expected);
                match self.policy {
                    UnknownRegionPolicy::Accept if !contradicts => {
                        Ok(ConfidenceSource::RawExternal)
                    }
                    _ => Err(DiscoveryError::ImplausibleResult { region: expected }),
                }
            }
        }
    }
}

#[async_trait]
impl GeocodeTier for ExternalTier {
    fn id(&self) -> &'static str {
        self.service.id()
    }

    async fn resolve(&self, query: &GeoQuery) -> Option<Result<GeoResult>> {
        let mut rejection = None;

        for text in Self::query_ladder(query) {
            let place = match self.service.search(&text).await {
                Ok(Some(place)) => place,
                Ok(None) => {
                    debug!("{} has no match for '{}'", self.service.id(), text);
                    continue;
                }
                Err(e) => return Some(Err(e)),
            };

            match self.judge(query, &place) {
                Ok(source) => {
                    let mut result = GeoResult::new(place.point, source);
                    result.resolved_city = place.city;
                    result.resolved_region_code = place.region_code;
                    return Some(Ok(result));
                }
                Err(e) => {
                    warn!(
                        "Discarding {} answer for '{}' at ({}, {}): {}",
                        self.service.id(),
                        text,
                        place.point.latitude,
                        place.point.longitude,
                        e
                    );
                    rejection = Some(e);
                }
            }
        }

        rejection.map(Err)
    }
}

fn join(parts: &[Option<&str>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Geocoder answering from a fixed table of query text -> place.
    struct ScriptedGeocoder {
        answers: HashMap<String, GeocodedPlace>,
        seen: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedGeocoder {
        fn new(answers: Vec<(&str, GeocodedPlace)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(text, place)| (text.to_string(), place))
                    .collect(),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GeocodingService for ScriptedGeocoder {
        fn id(&self) -> &'static str {
            "SCRIPTED"
        }

        async fn search(&self, text: &str) -> Result<Option<GeocodedPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            Ok(self.answers.get(text).cloned())
        }
    }

    fn pleyel() -> GeoQuery {
        GeoQuery::for_venue(
            Some("Salle Pleyel"),
            Some("252 Rue du Faubourg Saint-Honoré"),
            Some("Paris"),
            Some("75008"),
        )
    }

    #[test]
    fn test_query_ladder_order() {
        let ladder = ExternalTier::query_ladder(&pleyel());
        assert_eq!(
            ladder,
            vec![
                "Salle Pleyel, 252 Rue du Faubourg Saint-Honoré, 75008, Paris, France",
                "Salle Pleyel, Paris, France",
                "252 Rue du Faubourg Saint-Honoré, 75008, Paris, France",
                "75008, France",
            ]
        );
    }

    #[test]
    fn test_query_ladder_skips_missing_parts() {
        let query = GeoQuery::for_venue(Some("La Cigale"), None, Some("Paris"), None);
        assert_eq!(ExternalTier::query_ladder(&query), vec!["La Cigale, Paris, France"]);
    }

    #[tokio::test]
    async fn test_wrong_region_answer_falls_through_to_next_query() {
        // The most specific query lands on a homonym in Lyon
        let geocoder = Arc::new(ScriptedGeocoder::new(vec![
            (
                "Salle Pleyel, 252 Rue du Faubourg Saint-Honoré, 75008, Paris, France",
                GeocodedPlace::at(GeoPoint::new(45.7640, 4.8357)),
            ),
            (
                "Salle Pleyel, Paris, France",
                GeocodedPlace::at(GeoPoint::new(48.8770, 2.3006)),
            ),
        ]));
        let tier = ExternalTier::new(geocoder.clone(), Arc::new(RegionTable::new()));

        let result = tier.resolve(&pleyel()).await.unwrap().unwrap();
        assert_eq!(result.latitude, 48.8770);
        assert_eq!(result.confidence_source, ConfidenceSource::PlausibilityChecked);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_only_implausible_answers_yield_rejection() {
        let lyon = GeocodedPlace::at(GeoPoint::new(45.7640, 4.8357));
        let geocoder = Arc::new(ScriptedGeocoder::new(vec![
            ("Salle Pleyel, Paris, France", lyon.clone()),
            ("75008, France", lyon),
        ]));
        let tier = ExternalTier::new(geocoder, Arc::new(RegionTable::new()));

        let outcome = tier.resolve(&pleyel()).await.unwrap();
        assert!(matches!(
            outcome,
            Err(DiscoveryError::ImplausibleResult { ref region }) if region == "75"
        ));
    }

    #[tokio::test]
    async fn test_no_answer_at_all_is_none() {
        let geocoder = Arc::new(ScriptedGeocoder::new(vec![]));
        let tier = ExternalTier::new(geocoder.clone(), Arc::new(RegionTable::new()));
        assert!(tier.resolve(&pleyel()).await.is_none());
        assert_eq!(geocoder.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_region_policy() {
        let query = GeoQuery::for_venue(Some("Salle Zénith"), None, Some("Limoges"), Some("87000"));
        let place = GeocodedPlace::at(GeoPoint::new(45.8336, 1.2611));
        let answers = || {
            Arc::new(ScriptedGeocoder::new(vec![(
                "Salle Zénith, Limoges, France",
                place.clone(),
            )]))
        };

        let accept = ExternalTier::new(answers(), Arc::new(RegionTable::new()));
        let result = accept.resolve(&query).await.unwrap().unwrap();
        assert_eq!(result.confidence_source, ConfidenceSource::RawExternal);

        let reject = ExternalTier::new(answers(), Arc::new(RegionTable::new())).with_config(
            &GeocodeConfig {
                unknown_region_policy: UnknownRegionPolicy::Reject,
                ..GeocodeConfig::default()
            },
        );
        assert!(matches!(reject.resolve(&query).await, Some(Err(_))));
    }

    #[tokio::test]
    async fn test_unknown_region_contradicted_by_geocoder_is_rejected() {
        let query = GeoQuery::for_venue(Some("Salle Zénith"), None, Some("Limoges"), Some("87000"));
        let mut elsewhere = GeocodedPlace::at(GeoPoint::new(47.0, 0.5));
        elsewhere.region_code = Some("37".to_string());
        let tier = ExternalTier::new(
            Arc::new(ScriptedGeocoder::new(vec![("Salle Zénith, Limoges, France", elsewhere)])),
            Arc::new(RegionTable::new()),
        );
        assert!(matches!(tier.resolve(&query).await, Some(Err(_))));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Reject".parse::<UnknownRegionPolicy>().unwrap(), UnknownRegionPolicy::Reject);
        assert!("maybe".parse::<UnknownRegionPolicy>().is_err());
    }
}

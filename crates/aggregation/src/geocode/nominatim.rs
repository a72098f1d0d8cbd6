//! External geocoding service.
//!
//! The engine talks to a Nominatim-compatible search API. The usage policy
//! requires a descriptive `User-Agent` and at most one request per second,
//! enforced through the shared [`RateLimiter`].

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::{DiscoveryError, Result};
use crate::geo::region_from_postal_code;
use crate::models::{GeoPoint, RegionCode, SourceId};
use crate::scheduler::{RateLimiter, UpstreamLimit};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "Gedeon/0.3 (event discovery)";
const PROVIDER_ID: &str = "NOMINATIM";

/// Structured answer of an external geocoder.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodedPlace {
    pub point: GeoPoint,
    pub display_name: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub region_code: Option<RegionCode>,
    pub state: Option<String>,
}

impl GeocodedPlace {
    pub fn at(point: GeoPoint) -> Self {
        Self {
            point,
            display_name: None,
            postal_code: None,
            city: None,
            region_code: None,
            state: None,
        }
    }
}

/// Free-text geocoding backend.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    fn id(&self) -> &'static str;

    /// Best match for `text`, or `None` when the service knows no such place.
    async fn search(&self, text: &str) -> Result<Option<GeocodedPlace>>;
}

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<SearchAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchAddress {
    postcode: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    /// `FR-75`, `FR-2A`...
    #[serde(rename = "ISO3166-2-lvl6")]
    iso_lvl6: Option<String>,
}

impl SearchHit {
    fn into_place(self) -> Option<GeocodedPlace> {
        let point = GeoPoint::new(self.lat.parse().ok()?, self.lon.parse().ok()?);
        if !point.is_valid() {
            return None;
        }
        let address = self.address.unwrap_or_default();
        let region_code = address
            .iso_lvl6
            .as_deref()
            .and_then(|iso| iso.rsplit('-').next())
            .map(str::to_string)
            .or_else(|| address.postcode.as_deref().and_then(region_from_postal_code));

        Some(GeocodedPlace {
            point,
            display_name: self.display_name,
            postal_code: address.postcode,
            city: address
                .city
                .or(address.town)
                .or(address.village)
                .or(address.municipality),
            region_code,
            state: address.state,
        })
    }
}

// ============================================================================
// NominatimClient
// ============================================================================

/// Nominatim search client.
pub struct NominatimClient {
    client: Client,
    base_url: String,
    user_agent: String,
    country_codes: String,
    limiter: Arc<RateLimiter>,
}

impl NominatimClient {
    /// Client for `base_url`, throttled through `limiter`.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        limiter.configure(&Self::upstream(), UpstreamLimit::one_per_second());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            country_codes: "fr".to_string(),
            limiter,
        }
    }

    /// Restricts results to the given ISO 3166-1 codes (comma separated).
    pub fn with_country_codes(mut self, codes: impl Into<String>) -> Self {
        self.country_codes = codes.into();
        self
    }

    fn upstream() -> SourceId {
        Cow::Borrowed(PROVIDER_ID)
    }
}

#[async_trait]
impl GeocodingService for NominatimClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn search(&self, text: &str) -> Result<Option<GeocodedPlace>> {
        self.limiter.acquire(&Self::upstream()).await;

        let url = format!("{}/search", self.base_url);
        debug!("Nominatim search: {}", text);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("q", text),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
                ("countrycodes", self.country_codes.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::SourceTimeout {
                        source_name: PROVIDER_ID.to_string(),
                    }
                } else {
                    DiscoveryError::Geocoder {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DiscoveryError::Geocoder {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let hits: Vec<SearchHit> = response.json().await?;
        Ok(hits.into_iter().find_map(SearchHit::into_place))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_hit() {
        let raw = r#"[{
            "lat": "48.8707", "lon": "2.3477",
            "display_name": "Le Grand Rex, 1, Boulevard Poissonnière, Paris",
            "address": {
                "town": "Paris", "postcode": "75002", "state": "Île-de-France",
                "ISO3166-2-lvl6": "FR-75"
            }
        }]"#;
        let hits: Vec<SearchHit> = serde_json::from_str(raw).unwrap();
        let place = hits.into_iter().next().unwrap().into_place().unwrap();

        assert_eq!(place.point, GeoPoint::new(48.8707, 2.3477));
        assert_eq!(place.city.as_deref(), Some("Paris"));
        assert_eq!(place.region_code.as_deref(), Some("75"));
        assert_eq!(place.postal_code.as_deref(), Some("75002"));
    }

    #[test]
    fn test_region_falls_back_to_postcode() {
        let hit = SearchHit {
            lat: "43.2965".to_string(),
            lon: "5.3698".to_string(),
            display_name: None,
            address: Some(SearchAddress {
                postcode: Some("13001".to_string()),
                ..SearchAddress::default()
            }),
        };
        assert_eq!(hit.into_place().unwrap().region_code.as_deref(), Some("13"));
    }

    #[test]
    fn test_unparseable_coordinates_are_dropped() {
        let hit = SearchHit {
            lat: "north".to_string(),
            lon: "2.0".to_string(),
            display_name: None,
            address: None,
        };
        assert!(hit.into_place().is_none());
    }
}

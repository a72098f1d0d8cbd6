//! Showtime upstream for curated venues.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{DiscoveryError, Result};
use crate::geocode::Venue;

const PROVIDER_ID: &str = "SHOWTIMES";

/// One screening.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Time-varying sub-items of a venue (today's films and their times).
#[async_trait]
pub trait ShowtimeProvider: Send + Sync {
    async fn showtimes(&self, venue: &Venue, date: NaiveDate) -> Result<Vec<Showtime>>;
}

/// `GET {base}/cinemas/{id}/showtimes?date=YYYY-MM-DD`.
pub struct HttpShowtimeProvider {
    client: Client,
    base_url: String,
}

impl HttpShowtimeProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ShowtimeProvider for HttpShowtimeProvider {
    async fn showtimes(&self, venue: &Venue, date: NaiveDate) -> Result<Vec<Showtime>> {
        let url = format!(
            "{}/cinemas/{}/showtimes",
            self.base_url,
            urlencoding::encode(&venue.id)
        );
        debug!("Showtimes request for '{}' on {}", venue.name, date);

        let response = self
            .client
            .get(&url)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::SourceTimeout {
                        source_name: PROVIDER_ID.to_string(),
                    }
                } else {
                    DiscoveryError::source_unavailable(PROVIDER_ID, format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(DiscoveryError::source_unavailable(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }
        Ok(response.json().await?)
    }
}

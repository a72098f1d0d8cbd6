//! Agenda directory REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::models::{AgendaChannel, AgendaEvent, ChannelPage, EventPage};
use crate::errors::{DiscoveryError, Result};
use crate::geo::BoundingBox;

pub const DEFAULT_BASE_URL: &str = "https://api.openagenda.com/v2";
const PROVIDER_ID: &str = "OPENAGENDA";

/// Filters of a per-channel event request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelRequest {
    pub bbox: BoundingBox,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub size: usize,
}

/// Directory of independently queryable agenda channels.
#[async_trait]
pub trait AgendaDirectory: Send + Sync {
    /// Every channel the directory lists.
    async fn channels(&self) -> Result<Vec<AgendaChannel>>;

    /// Events of one channel inside the box and date range.
    async fn channel_events(
        &self,
        channel: &AgendaChannel,
        request: &ChannelRequest,
    ) -> Result<Vec<AgendaEvent>>;
}

/// OpenAgenda v2 client.
pub struct OpenAgendaClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: usize,
}

impl OpenAgendaClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: 100,
        }
    }

    /// Size of the channel directory page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("OpenAgenda request: {} with {} params", path, params.len());

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
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
        if !status.is_success() {
            return Err(DiscoveryError::source_unavailable(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AgendaDirectory for OpenAgendaClient {
    async fn channels(&self) -> Result<Vec<AgendaChannel>> {
        let page: ChannelPage = self
            .get("/agendas", &[("size", self.page_size.to_string())])
            .await?;
        Ok(page.agendas)
    }

    async fn channel_events(
        &self,
        channel: &AgendaChannel,
        request: &ChannelRequest,
    ) -> Result<Vec<AgendaEvent>> {
        let path = format!("/agendas/{}/events", channel.uid);
        let page: EventPage = self.get(&path, &event_params(request)).await?;
        Ok(page.events)
    }
}

fn event_params(request: &ChannelRequest) -> Vec<(&'static str, String)> {
    let ne = request.bbox.north_east;
    let sw = request.bbox.south_west;
    vec![
        ("size", request.size.to_string()),
        ("detailed", "1".to_string()),
        ("geo[northEast][lat]", ne.latitude.to_string()),
        ("geo[northEast][lng]", ne.longitude.to_string()),
        ("geo[southWest][lat]", sw.latitude.to_string()),
        ("geo[southWest][lng]", sw.longitude.to_string()),
        ("timings[gte]", request.from.format("%Y-%m-%d").to_string()),
        ("timings[lte]", request.to.format("%Y-%m-%d").to_string()),
    ]
}

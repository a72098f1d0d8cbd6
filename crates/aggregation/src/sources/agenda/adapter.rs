use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::client::{AgendaDirectory, ChannelRequest};
use super::models::AgendaChannel;
use super::AGENDA_SOURCE;
use crate::cache::{Clock, FileCache, SystemClock};
use crate::errors::{DiscoveryError, Result};
use crate::geo::bounding_box;
use crate::geocode::Geocoder;
use crate::models::{Event, NearbyQuery};
use crate::sources::placement::locate_within_radius;
use crate::sources::SourceAdapter;

/// Fan-out limits of the agenda adapter.
#[derive(Clone, Debug, PartialEq)]
pub struct AgendaConfig {
    /// Curated channels queried per request.
    pub curated_cap: usize,
    /// Community channels queried after the curated ones.
    pub community_cap: usize,
    /// Channels in flight at once.
    pub workers: usize,
    /// Deadline of one channel, geocoding included. Shorter than the
    /// scheduler's agenda budget.
    pub channel_timeout: Duration,
    pub events_per_channel: usize,
    pub catalog_ttl: Duration,
    /// Where the channel catalog is snapshotted; `None` keeps it in memory.
    pub catalog_file: Option<PathBuf>,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        Self {
            curated_cap: 20,
            community_cap: 10,
            workers: 10,
            channel_timeout: Duration::from_secs(20),
            events_per_channel: 30,
            catalog_ttl: Duration::from_secs(24 * 3600),
            catalog_file: None,
        }
    }
}

/// Curated channels first (capped), then community channels (capped),
/// each group in directory order.
pub fn rank_channels(channels: &[AgendaChannel], config: &AgendaConfig) -> Vec<AgendaChannel> {
    let curated = channels
        .iter()
        .filter(|channel| channel.official)
        .take(config.curated_cap);
    let community = channels
        .iter()
        .filter(|channel| !channel.official)
        .take(config.community_cap);
    curated.chain(community).cloned().collect()
}

/// Source adapter over a paginated agenda directory.
pub struct AgendaAdapter {
    directory: Arc<dyn AgendaDirectory>,
    geocoder: Arc<dyn Geocoder>,
    catalog: FileCache<Vec<AgendaChannel>>,
    config: AgendaConfig,
}

impl AgendaAdapter {
    pub fn new(
        directory: Arc<dyn AgendaDirectory>,
        geocoder: Arc<dyn Geocoder>,
        config: AgendaConfig,
    ) -> Self {
        Self::with_clock(directory, geocoder, config, SystemClock::shared())
    }

    pub fn with_clock(
        directory: Arc<dyn AgendaDirectory>,
        geocoder: Arc<dyn Geocoder>,
        config: AgendaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = FileCache::with_clock(config.catalog_file.clone(), config.catalog_ttl, clock);
        Self {
            directory,
            geocoder,
            catalog,
            config,
        }
    }

    /// Channel catalog: fresh cache, else the directory, else a stale copy.
    pub async fn channels(&self) -> Result<Vec<AgendaChannel>> {
        if let Some(channels) = self.catalog.get() {
            return Ok(channels);
        }

        match self.directory.channels().await {
            Ok(channels) if !channels.is_empty() => {
                info!("Refreshed agenda catalog: {} channels", channels.len());
                if let Err(e) = self.catalog.store(channels.clone()) {
                    warn!("Failed to persist agenda catalog: {}", e);
                }
                Ok(channels)
            }
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    Ok(_) => "directory listed no channels".to_string(),
                };
                match self.catalog.get_stale() {
                    Some(stale) => {
                        warn!("Agenda catalog refresh failed ({}), using stale copy", reason);
                        Ok(stale)
                    }
                    None => Err(DiscoveryError::source_unavailable(AGENDA_SOURCE, reason)),
                }
            }
        }
    }

    async fn fetch_channel(
        &self,
        channel: &AgendaChannel,
        request: &ChannelRequest,
        query: &NearbyQuery,
    ) -> Result<Vec<Event>> {
        let raw = self.directory.channel_events(channel, request).await?;
        let events: Vec<Event> = raw.into_iter().map(|ev| ev.into_event(channel)).collect();
        Ok(locate_within_radius(events, query, self.geocoder.as_ref()).await)
    }
}

#[async_trait]
impl SourceAdapter for AgendaAdapter {
    fn id(&self) -> &'static str {
        AGENDA_SOURCE
    }

    async fn fetch(&self, query: &NearbyQuery) -> Result<Vec<Event>> {
        let catalog = self.channels().await?;
        let ranked = rank_channels(&catalog, &self.config);
        let request = ChannelRequest {
            bbox: bounding_box(query.center, query.radius_km),
            from: query.window.start,
            to: query.window.end,
            size: self.config.events_per_channel,
        };

        let channel_count = ranked.len();
        let request = &request;

        // Owned channels keep the fan-out future Send
        let outcomes: Vec<(String, Result<Vec<Event>>)> = stream::iter(ranked)
            .map(|channel: AgendaChannel| async move {
                let outcome = tokio::time::timeout(
                    self.config.channel_timeout,
                    self.fetch_channel(&channel, request, query),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(DiscoveryError::SourceTimeout {
                        source_name: format!("{}/{}", AGENDA_SOURCE, channel.uid),
                    })
                });
                (channel.display_title().to_string(), outcome)
            })
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut events = Vec::new();
        let mut failed = 0;
        for (title, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    debug!("Agenda '{}': {} events", title, found.len());
                    events.extend(found);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Skipping agenda '{}': {}", title, e);
                }
            }
        }

        info!(
            "Agenda: {} events from {} channels ({} skipped)",
            events.len(),
            channel_count,
            failed
        );
        events.sort_by(Event::cmp_distance_then_start);
        Ok(events)
    }
}

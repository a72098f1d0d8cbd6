//! Aggregation scheduler - runs every source concurrently under its own
//! deadline and merges whatever came back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::diagnostics::{AggregationDiagnostics, SourceReport, SourceStatus};
use crate::errors::DiscoveryError;
use crate::models::{Event, NearbyQuery};
use crate::sources::agenda::AGENDA_SOURCE;
use crate::sources::cinema::CINEMA_SOURCE;
use crate::sources::placement::within_radius;
use crate::sources::spatial::SPATIAL_SOURCE;
use crate::sources::SourceAdapter;

/// Concurrency and deadlines of the top-level fan-out.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Sources running at once.
    pub source_concurrency: usize,
    /// Deadline of sources without an explicit entry in `timeouts`.
    pub default_timeout: Duration,
    pub timeouts: HashMap<String, Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let timeouts = [
            (SPATIAL_SOURCE, Duration::from_secs(10)),
            (AGENDA_SOURCE, Duration::from_secs(25)),
            (CINEMA_SOURCE, Duration::from_secs(15)),
        ]
        .into_iter()
        .map(|(id, timeout)| (id.to_string(), timeout))
        .collect();

        Self {
            source_concurrency: 2,
            default_timeout: Duration::from_secs(15),
            timeouts,
        }
    }
}

impl SchedulerConfig {
    pub fn timeout_for(&self, source: &str) -> Duration {
        self.timeouts
            .get(source)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    pub fn with_timeout(mut self, source: &str, timeout: Duration) -> Self {
        self.timeouts.insert(source.to_string(), timeout);
        self
    }
}

/// Merged outcome of one aggregate request.
#[derive(Clone, Debug, Default)]
pub struct Aggregation {
    /// Placed, inside the radius, sorted by `(distance_km, start)`.
    pub events: Vec<Event>,
    pub diagnostics: AggregationDiagnostics,
}

impl Aggregation {
    /// Per-source counts; failed or timed-out sources count zero.
    pub fn sources(&self) -> BTreeMap<String, usize> {
        self.diagnostics.counts()
    }
}

/// Runs every registered [`SourceAdapter`] with bulkhead isolation.
///
/// A source that fails or overruns its deadline contributes zero events
/// and a report; it never aborts its siblings and never surfaces as an
/// error of [`aggregate`](Self::aggregate).
pub struct AggregationScheduler {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    config: SchedulerConfig,
}

impl AggregationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            adapters: Vec::new(),
            config,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|adapter| adapter.id()).collect()
    }

    pub async fn aggregate(&self, query: &NearbyQuery) -> Aggregation {
        let started = Instant::now();

        let runs: Vec<(SourceReport, Vec<Event>)> = stream::iter(self.adapters.iter())
            .map(|adapter| self.run_source(adapter.as_ref(), query))
            .buffer_unordered(self.config.source_concurrency.max(1))
            .collect()
            .await;

        let mut diagnostics = AggregationDiagnostics::default();
        let mut merged = Vec::new();
        for (report, events) in runs {
            diagnostics.push(report);
            merged.extend(events);
        }
        // Report order follows registration, not completion
        let order = self.source_ids();
        diagnostics
            .reports
            .sort_by_key(|report| order.iter().position(|id| *id == report.source));

        let before = merged.len();
        let events = within_radius(merged, query);
        if events.len() < before {
            debug!(
                "Dropped {} events without coordinates or beyond {} km",
                before - events.len(),
                query.radius_km
            );
        }

        let summary = diagnostics
            .reports
            .iter()
            .map(|report| match &report.status {
                SourceStatus::Ok => format!("{}={}", report.source, report.count),
                SourceStatus::TimedOut => format!("{}=timeout", report.source),
                SourceStatus::Failed { .. } => format!("{}=failed", report.source),
            })
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            "Aggregated {} events around ({:.4}, {:.4}) r={}km in {}ms [{}]",
            events.len(),
            query.center.latitude,
            query.center.longitude,
            query.radius_km,
            started.elapsed().as_millis(),
            summary
        );

        Aggregation {
            events,
            diagnostics,
        }
    }

    async fn run_source(
        &self,
        adapter: &dyn SourceAdapter,
        query: &NearbyQuery,
    ) -> (SourceReport, Vec<Event>) {
        let source = adapter.id();
        let deadline = self.config.timeout_for(source);
        let started = Instant::now();

        let (status, events) = match tokio::time::timeout(deadline, adapter.fetch(query)).await {
            Ok(Ok(events)) => (SourceStatus::Ok, events),
            Ok(Err(e)) => {
                warn!("Source {} failed: {}", source, e);
                (
                    SourceStatus::Failed {
                        message: e.to_string(),
                    },
                    Vec::new(),
                )
            }
            Err(_) => {
                let e = DiscoveryError::SourceTimeout {
                    source_name: source.to_string(),
                };
                warn!("{} after {:?}", e, deadline);
                (SourceStatus::TimedOut, Vec::new())
            }
        };

        let report = SourceReport {
            source: source.to_string(),
            status,
            count: events.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        (report, events)
    }
}

//! End-to-end behaviour of the read and write paths over fake upstreams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use gedeon_aggregation::cache::{GeoCache, ManualClock};
use gedeon_aggregation::geo::RegionTable;
use gedeon_aggregation::geocode::{GeocodedPlace, GeocodingService, VenueCatalog};
use gedeon_aggregation::sources::agenda::{
    AgendaAdapter, AgendaChannel, AgendaConfig, AgendaDirectory, AgendaEvent, ChannelRequest,
};
use gedeon_aggregation::sources::spatial::{SpatialAdapter, SpatialStore};
use gedeon_aggregation::{
    content_hash, AggregationScheduler, ConfidenceSource, DeduplicationMatcher, DiscoveryError,
    DiscoveryService, Event, GeoPoint, GeoQuery, GeocodeConfig, GeocodeResolver, Geocoder,
    InMemoryEventPool, NearbyQuery, ResultAssembler, Result, SchedulerConfig, SourceStatus,
    SubmitAction,
};

const PARIS: (f64, f64) = (48.8566, 2.3522);

// ============================================================================
// Fakes
// ============================================================================

/// Store that answers with a bounding-box superset, as an index prefilter would.
struct ListingStore {
    rows: Vec<Event>,
}

#[async_trait]
impl SpatialStore for ListingStore {
    async fn events_within(&self, _query: &NearbyQuery, limit: usize) -> Result<Vec<Event>> {
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}

/// Directory that never answers in time.
struct StalledDirectory;

#[async_trait]
impl AgendaDirectory for StalledDirectory {
    async fn channels(&self) -> Result<Vec<AgendaChannel>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn channel_events(
        &self,
        _channel: &AgendaChannel,
        _request: &ChannelRequest,
    ) -> Result<Vec<AgendaEvent>> {
        Ok(Vec::new())
    }
}

/// Geocoder answering from a script, one answer per call, counting calls.
struct ScriptedService {
    answers: Vec<GeoPoint>,
    calls: AtomicUsize,
}

impl ScriptedService {
    fn new(answers: Vec<GeoPoint>) -> Self {
        Self {
            answers,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GeocodingService for ScriptedService {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn search(&self, _text: &str) -> Result<Option<GeocodedPlace>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .get(call.min(self.answers.len().saturating_sub(1)))
            .copied()
            .map(GeocodedPlace::at))
    }
}

fn listing(id: &str, title: &str, latitude: f64, longitude: f64) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        start: Some(Utc.with_ymd_and_hms(2026, 10, 24, 20, 0, 0).unwrap()),
        latitude: Some(latitude),
        longitude: Some(longitude),
        source_name: "datatourisme".to_string(),
        ..Event::default()
    }
}

fn resolver(service: Arc<ScriptedService>) -> Arc<GeocodeResolver> {
    Arc::new(GeocodeResolver::standard(
        Arc::new(GeoCache::default()),
        Arc::new(VenueCatalog::default()),
        service,
        Arc::new(RegionTable::new()),
        &GeocodeConfig::default(),
    ))
}

fn paris_venue_query() -> GeoQuery {
    GeoQuery::for_venue(
        Some("Péniche Cinéphile"),
        Some("7 Port de la Gare, 75013 Paris"),
        Some("Paris"),
        None,
    )
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
    ))
}

// ============================================================================
// Read path
// ============================================================================

#[tokio::test]
async fn paris_five_km_example() {
    let mut rows = vec![
        listing("dt-1", "Concert au Châtelet", 48.8583, 2.3470),
        listing("dt-2", "Exposition Orsay", 48.8600, 2.3266),
        listing("dt-3", "Bal de Montmartre", 48.8867, 2.3431),
        // Bounding-box corner, ~6.3 km away
        listing("dt-4", "Marché de Vincennes", 48.8970, 2.4130),
        listing("dt-5", "Visite guidée", 48.8530, 2.3499),
    ];
    // Same listing imported twice under another id
    let mut copy = rows[0].clone();
    copy.id = "dt-1-bis".to_string();
    rows.push(copy);

    let scheduler = AggregationScheduler::new(SchedulerConfig::default())
        .with_adapter(Arc::new(SpatialAdapter::new(Arc::new(ListingStore { rows }))));
    let service = DiscoveryService::new(
        scheduler,
        ResultAssembler::default(),
        resolver(Arc::new(ScriptedService::new(Vec::new()))),
        Arc::new(InMemoryEventPool::new()),
        DeduplicationMatcher::default(),
    )
    .with_clock(clock());

    let result = service
        .nearby(Some(GeoPoint::new(PARIS.0, PARIS.1)), 5.0, 30)
        .await
        .unwrap();

    assert_eq!(result.events.len(), 4);
    for event in &result.events {
        let distance = event.distance_km.unwrap();
        assert!((0.0..=5.0).contains(&distance), "{} at {}", event.id, distance);
    }
    for pair in result.events.windows(2) {
        assert!(pair[0].distance_km <= pair[1].distance_km);
    }
    let hashes: HashSet<String> = result.events.iter().map(content_hash).collect();
    assert_eq!(hashes.len(), result.events.len());
    assert_eq!(result.sources["spatial"], 5);
}

#[tokio::test]
async fn stalled_agenda_counts_zero_without_holding_the_request() {
    let rows = vec![listing("dt-1", "Concert", 48.8583, 2.3470)];
    let agenda = AgendaAdapter::new(
        Arc::new(StalledDirectory),
        resolver(Arc::new(ScriptedService::new(Vec::new()))),
        AgendaConfig {
            channel_timeout: Duration::from_millis(50),
            ..AgendaConfig::default()
        },
    );
    let config = SchedulerConfig::default().with_timeout("agenda", Duration::from_millis(200));
    let scheduler = AggregationScheduler::new(config)
        .with_adapter(Arc::new(SpatialAdapter::new(Arc::new(ListingStore { rows }))))
        .with_adapter(Arc::new(agenda));

    let query = NearbyQuery::new(
        Some(GeoPoint::new(PARIS.0, PARIS.1)),
        5.0,
        30,
        Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap().date_naive(),
    )
    .unwrap();

    let started = Instant::now();
    let result = scheduler.aggregate(&query).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let sources = result.sources();
    assert_eq!(sources["agenda"], 0);
    assert_eq!(sources["spatial"], 1);
    assert_eq!(result.events.len(), 1);
    assert_eq!(
        result.diagnostics.get("agenda").unwrap().status,
        SourceStatus::TimedOut
    );
}

// ============================================================================
// Geocoding
// ============================================================================

#[tokio::test]
async fn repeated_geocode_is_served_from_cache() {
    let service = Arc::new(ScriptedService::new(vec![GeoPoint::new(48.8380, 2.3770)]));
    let resolver = resolver(service.clone());

    let first = resolver.resolve(&paris_venue_query()).await.unwrap();
    let calls = service.calls.load(Ordering::SeqCst);
    assert_eq!(calls, 1);
    assert_eq!(first.confidence_source, ConfidenceSource::PlausibilityChecked);

    let second = resolver.resolve(&paris_venue_query()).await.unwrap();
    assert_eq!(service.calls.load(Ordering::SeqCst), calls);
    assert_eq!(second.point(), first.point());
    assert_eq!(second.confidence_source, ConfidenceSource::Cache);
}

#[tokio::test]
async fn wrong_region_answer_falls_through() {
    // First rung lands in Lyon, second in the 13th arrondissement
    let service = Arc::new(ScriptedService::new(vec![
        GeoPoint::new(45.7640, 4.8357),
        GeoPoint::new(48.8380, 2.3770),
    ]));
    let resolver = resolver(service.clone());

    let result = resolver.resolve(&paris_venue_query()).await.unwrap();
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.point(), GeoPoint::new(48.8380, 2.3770));
    assert_eq!(result.confidence_source, ConfidenceSource::PlausibilityChecked);
}

#[tokio::test]
async fn only_wrong_region_answers_leave_the_record_unresolved() {
    let service = Arc::new(ScriptedService::new(vec![GeoPoint::new(43.2965, 5.3698)]));
    let resolver = resolver(service);

    let result = resolver.resolve(&paris_venue_query()).await;
    assert!(matches!(result, Err(DiscoveryError::RecordUnresolvable(_))));
}

// ============================================================================
// Write path
// ============================================================================

fn write_service() -> DiscoveryService {
    DiscoveryService::new(
        AggregationScheduler::new(SchedulerConfig::default()),
        ResultAssembler::default(),
        resolver(Arc::new(ScriptedService::new(Vec::new()))),
        Arc::new(InMemoryEventPool::new()),
        DeduplicationMatcher::default(),
    )
    .with_clock(clock())
}

fn scan(title: &str, latitude: f64) -> Event {
    Event {
        title: title.to_string(),
        start: Some(Utc.with_ymd_and_hms(2026, 11, 7, 21, 0, 0).unwrap()),
        latitude: Some(latitude),
        longitude: Some(2.3522),
        ..Event::default()
    }
}

#[tokio::test]
async fn identical_resubmission_is_rejected_by_hash() {
    let service = write_service();
    let first = service.submit(scan("Soirée Jazz Manouche", 48.8566), None).await.unwrap();
    assert_eq!(first.action, SubmitAction::Inserted);

    match service.submit(scan("Soirée Jazz Manouche", 48.8566), None).await {
        Err(DiscoveryError::DuplicateContent { existing_id }) => assert_eq!(existing_id, first.id),
        other => panic!("expected duplicate content, got {:?}", other),
    }
}

#[tokio::test]
async fn similar_rescan_nearby_replaces_and_keeps_id() {
    let service = write_service();
    let first = service.submit(scan("Soirée Jazz Manouche", 48.8566), None).await.unwrap();

    // One character off, ~0.3 km away
    let second = service
        .submit(scan("Soiree Jazz Manouches", 48.8593), None)
        .await
        .unwrap();
    assert_eq!(second.action, SubmitAction::Replaced);
    assert_eq!(second.id, first.id);

    // Same title 3 km away is another occurrence
    let third = service
        .submit(scan("Soirée Jazz Manouche", 48.8836), None)
        .await
        .unwrap();
    assert_eq!(third.action, SubmitAction::Inserted);
    assert_ne!(third.id, first.id);
}

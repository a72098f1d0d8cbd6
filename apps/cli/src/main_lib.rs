use std::sync::Arc;

use gedeon_aggregation::cache::GeoCache;
use gedeon_aggregation::geo::RegionTable;
use gedeon_aggregation::geocode::{GeocodeConfig, GeocodeResolver, NominatimClient, VenueCatalog};
use gedeon_aggregation::sources::agenda::{AgendaAdapter, AgendaConfig, OpenAgendaClient};
use gedeon_aggregation::sources::cinema::{CinemaAdapter, CinemaConfig, HttpShowtimeProvider};
use gedeon_aggregation::sources::spatial::SpatialAdapter;
use gedeon_aggregation::{
    AggregationScheduler, AssemblerConfig, DeduplicationMatcher, DiscoveryService, RateLimiter,
    ResultAssembler, SchedulerConfig,
};
use gedeon_storage_sqlite::{open, spawn_writer, EventRepository};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub service: DiscoveryService,
    pub repository: Arc<EventRepository>,
}

pub fn init_tracing() {
    let log_format = std::env::var("GEDEON_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Output goes to stderr; stdout carries the command's JSON.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Opens the database and wires every source, the geocoding chain and the
/// write path into one service.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = open(&config.db_path)?;
    tracing::info!("Database path in use: {}", config.db_path);
    let writer = spawn_writer(&pool);
    let repository = Arc::new(EventRepository::new(pool, writer));

    let limiter = Arc::new(RateLimiter::new());
    let catalog = Arc::new(match &config.venue_catalog {
        Some(path) => VenueCatalog::load(path)?,
        None => VenueCatalog::default(),
    });
    tracing::info!("Venue catalog holds {} venues", catalog.len());

    let geocode_config = GeocodeConfig {
        unknown_region_policy: config.unknown_region_policy,
        ..GeocodeConfig::default()
    };
    let mut cache = GeoCache::new(geocode_config.negative_ttl);
    if let Some(path) = &config.geocode_cache_file {
        cache = cache.with_persistence(path.clone())?;
    }
    let nominatim = NominatimClient::new(
        config.nominatim_url.clone(),
        config.user_agent.clone(),
        limiter.clone(),
    );
    let geocoder = Arc::new(GeocodeResolver::standard(
        Arc::new(cache),
        catalog.clone(),
        Arc::new(nominatim),
        Arc::new(RegionTable::new()),
        &geocode_config,
    ));

    let mut scheduler = AggregationScheduler::new(SchedulerConfig::default());
    scheduler.register(Arc::new(SpatialAdapter::new(repository.clone())));

    match &config.agenda_api_key {
        Some(key) => {
            let directory = OpenAgendaClient::new(config.agenda_base_url.clone(), key.clone());
            let agenda_config = AgendaConfig {
                catalog_file: config.agenda_cache_file.clone(),
                ..AgendaConfig::default()
            };
            scheduler.register(Arc::new(AgendaAdapter::new(
                Arc::new(directory),
                geocoder.clone(),
                agenda_config,
            )));
        }
        None => tracing::warn!("OPENAGENDA_API_KEY not set, agenda source disabled"),
    }

    match &config.showtimes_url {
        Some(url) if !catalog.is_empty() => {
            scheduler.register(Arc::new(CinemaAdapter::new(
                catalog.clone(),
                Arc::new(HttpShowtimeProvider::new(url.clone())),
                limiter.clone(),
                CinemaConfig::default(),
            )));
        }
        _ => tracing::warn!("Venue catalog or showtimes URL missing, cinema source disabled"),
    }
    tracing::info!("Sources registered: {:?}", scheduler.source_ids());

    let service = DiscoveryService::new(
        scheduler,
        ResultAssembler::new(AssemblerConfig {
            max_results: config.max_results,
        }),
        geocoder,
        repository.clone(),
        DeduplicationMatcher::default(),
    );

    Ok(AppState {
        service,
        repository,
    })
}

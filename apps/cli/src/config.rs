use std::path::PathBuf;

use anyhow::Context;
use gedeon_aggregation::assembler::DEFAULT_MAX_RESULTS;
use gedeon_aggregation::geocode::{DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT};
use gedeon_aggregation::sources::agenda::DEFAULT_BASE_URL as DEFAULT_AGENDA_URL;
use gedeon_aggregation::UnknownRegionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// The agenda source is only registered when a key is present.
    pub agenda_api_key: Option<String>,
    pub agenda_base_url: String,
    pub agenda_cache_file: Option<PathBuf>,
    pub geocode_cache_file: Option<PathBuf>,
    pub venue_catalog: Option<PathBuf>,
    pub showtimes_url: Option<String>,
    pub nominatim_url: String,
    pub user_agent: String,
    pub max_results: usize,
    pub unknown_region_policy: UnknownRegionPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let max_results = match non_empty("GEDEON_MAX_RESULTS") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("GEDEON_MAX_RESULTS must be a count, got '{}'", raw))?,
            None => DEFAULT_MAX_RESULTS,
        };
        let unknown_region_policy = match non_empty("GEDEON_UNKNOWN_REGION_POLICY") {
            Some(raw) => raw.parse()?,
            None => UnknownRegionPolicy::default(),
        };

        Ok(Self {
            db_path: non_empty("GEDEON_DB_PATH").unwrap_or_else(|| "./db/gedeon.db".to_string()),
            agenda_api_key: non_empty("OPENAGENDA_API_KEY"),
            agenda_base_url: non_empty("OPENAGENDA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_AGENDA_URL.to_string()),
            agenda_cache_file: non_empty("GEDEON_AGENDA_CACHE_FILE").map(PathBuf::from),
            geocode_cache_file: non_empty("GEDEON_GEOCODE_CACHE_FILE").map(PathBuf::from),
            venue_catalog: non_empty("GEDEON_VENUE_CATALOG").map(PathBuf::from),
            showtimes_url: non_empty("GEDEON_SHOWTIMES_URL"),
            nominatim_url: non_empty("GEDEON_NOMINATIM_URL")
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            user_agent: non_empty("GEDEON_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_results,
            unknown_region_policy,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

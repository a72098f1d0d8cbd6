use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use log::{debug, info, warn};

use super::provider::{Showtime, ShowtimeProvider};
use super::CINEMA_SOURCE;
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::errors::Result;
use crate::geocode::{normalize_name, Venue, VenueCatalog};
use crate::models::{Event, NearbyQuery, SourceId};
use crate::scheduler::RateLimiter;
use crate::sources::SourceAdapter;

const SHOWTIMES_UPSTREAM: SourceId = Cow::Borrowed("SHOWTIMES");

#[derive(Clone, Debug, PartialEq)]
pub struct CinemaConfig {
    /// Lifetime of one venue's showtimes for one day.
    pub showtime_ttl: Duration,
    /// Pause between two uncached upstream requests.
    pub request_delay: Duration,
    /// Nearest venues considered per request.
    pub max_venues: usize,
    /// Days of showtimes fetched, starting at the window start.
    pub days: u32,
}

impl Default for CinemaConfig {
    fn default() -> Self {
        Self {
            showtime_ttl: Duration::from_secs(3600),
            request_delay: Duration::from_millis(200),
            max_venues: 10,
            days: 2,
        }
    }
}

/// Source adapter over the curated venue catalog.
///
/// The venue scan is a pure in-memory great-circle pass. Showtimes are
/// cached per `(venue, day)`; misses are fetched one after another with a
/// delay, trading latency for staying under the upstream's throttle.
pub struct CinemaAdapter {
    catalog: Arc<VenueCatalog>,
    provider: Arc<dyn ShowtimeProvider>,
    limiter: Arc<RateLimiter>,
    showtimes: TtlCache<(String, NaiveDate), Vec<Showtime>>,
    clock: Arc<dyn Clock>,
    config: CinemaConfig,
}

impl CinemaAdapter {
    pub fn new(
        catalog: Arc<VenueCatalog>,
        provider: Arc<dyn ShowtimeProvider>,
        limiter: Arc<RateLimiter>,
        config: CinemaConfig,
    ) -> Self {
        Self::with_clock(catalog, provider, limiter, config, SystemClock::shared())
    }

    pub fn with_clock(
        catalog: Arc<VenueCatalog>,
        provider: Arc<dyn ShowtimeProvider>,
        limiter: Arc<RateLimiter>,
        config: CinemaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            provider,
            limiter,
            showtimes: TtlCache::with_clock(Some(config.showtime_ttl), clock.clone()),
            clock,
            config,
        }
    }

    fn days(&self, query: &NearbyQuery) -> Vec<NaiveDate> {
        (0..self.config.days)
            .map(|offset| query.window.start + ChronoDuration::days(i64::from(offset)))
            .filter(|day| query.window.contains(*day))
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for CinemaAdapter {
    fn id(&self) -> &'static str {
        CINEMA_SOURCE
    }

    async fn fetch(&self, query: &NearbyQuery) -> Result<Vec<Event>> {
        let venues: Vec<(&Venue, f64)> = self
            .catalog
            .within(query)
            .into_iter()
            .take(self.config.max_venues)
            .collect();
        let days = self.days(query);
        let now = self.clock.now();

        let mut events = Vec::new();
        let mut misses = 0usize;
        for (venue, distance) in venues {
            let mut screenings = Vec::new();
            for day in &days {
                let key = (venue.id.clone(), *day);
                if let Some(cached) = self.showtimes.get(&key) {
                    screenings.extend(cached);
                    continue;
                }

                if misses > 0 {
                    tokio::time::sleep(self.config.request_delay).await;
                }
                misses += 1;
                self.limiter.acquire(&SHOWTIMES_UPSTREAM).await;
                match self.provider.showtimes(venue, *day).await {
                    Ok(fetched) => {
                        self.showtimes.insert(key, fetched.clone());
                        screenings.extend(fetched);
                    }
                    Err(e) => warn!("Showtimes for '{}' on {} unavailable: {}", venue.name, day, e),
                }
            }

            let upcoming: Vec<Showtime> = screenings
                .into_iter()
                .filter(|showtime| showtime.starts_at >= now)
                .collect();
            events.extend(group_by_film(venue, distance, upcoming));
        }

        info!(
            "Cinema: {} film events, {} upstream requests",
            events.len(),
            misses
        );
        events.sort_by(Event::cmp_distance_then_start);
        Ok(events)
    }
}

/// One event per film at a venue, starting at its earliest screening.
fn group_by_film(venue: &Venue, distance: f64, showtimes: Vec<Showtime>) -> Vec<Event> {
    let mut films: BTreeMap<String, Vec<Showtime>> = BTreeMap::new();
    for showtime in showtimes {
        films
            .entry(normalize_name(&showtime.title))
            .or_default()
            .push(showtime);
    }

    films
        .into_iter()
        .filter_map(|(key, mut screenings)| {
            screenings.sort_by_key(|s| s.starts_at);
            let first = screenings.first()?.clone();
            let times = screenings
                .iter()
                .map(|s| s.starts_at.format("%d/%m %H:%M").to_string())
                .collect::<Vec<_>>()
                .join(", ");
            debug!("'{}' at '{}': {} screenings", first.title, venue.name, screenings.len());

            let mut event = Event {
                id: format!("cine-{}-{}", venue.id, key.replace(' ', "-")),
                title: first.title.clone(),
                category: Some(first.genre.clone().unwrap_or_else(|| "Cinéma".to_string())),
                description: Some(format!("Séances : {}", times)),
                organizer: None,
                start: Some(first.starts_at),
                end: None,
                venue_name: Some(venue.name.clone()),
                address: venue.address.clone(),
                city: venue.city(),
                postal_code: venue.address.as_deref().and_then(crate::geo::extract_postal_code),
                latitude: None,
                longitude: None,
                distance_km: Some(distance),
                source_name: CINEMA_SOURCE.to_string(),
                source_url: screenings.iter().find_map(|s| s.url.clone()),
            };
            event.set_point(venue.point);
            Some(event)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::models::GeoPoint;
    use crate::scheduler::UpstreamLimit;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeShowtimes {
        calls: AtomicUsize,
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    #[async_trait]
    impl ShowtimeProvider for FakeShowtimes {
        async fn showtimes(&self, venue: &Venue, date: NaiveDate) -> Result<Vec<Showtime>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let day = date.format("%d").to_string().parse().unwrap();
            let film = |title: &str, hour: u32| Showtime {
                title: title.to_string(),
                starts_at: at(day, hour),
                genre: None,
                url: None,
            };
            Ok(match venue.id.as_str() {
                "rex" => vec![film("Playtime", 14), film("Playtime", 20), film("Mon Oncle", 9)],
                _ => Vec::new(),
            })
        }
    }

    fn venue(id: &str, latitude: f64, longitude: f64) -> Venue {
        Venue {
            id: id.to_string(),
            name: id.to_uppercase(),
            address: Some("1 Bd Poissonnière, 75002 Paris".to_string()),
            region: Some("75".to_string()),
            point: GeoPoint::new(latitude, longitude),
            source: None,
        }
    }

    fn adapter(clock: Arc<ManualClock>) -> (CinemaAdapter, Arc<FakeShowtimes>) {
        let catalog = VenueCatalog::from_venues(vec![
            venue("rex", 48.8707, 2.3477),
            venue("lyon", 45.7640, 4.8357),
        ]);
        let provider = Arc::new(FakeShowtimes {
            calls: AtomicUsize::new(0),
        });
        let limiter = Arc::new(RateLimiter::new().with_limit(
            SHOWTIMES_UPSTREAM,
            UpstreamLimit {
                requests_per_minute: 6000,
                burst: 10.0,
            },
        ));
        let config = CinemaConfig {
            request_delay: Duration::from_millis(1),
            ..CinemaConfig::default()
        };
        (
            CinemaAdapter::with_clock(Arc::new(catalog), provider.clone(), limiter, config, clock),
            provider,
        )
    }

    fn query() -> NearbyQuery {
        NearbyQuery::new(
            Some(GeoPoint::new(48.8566, 2.3522)),
            5.0,
            30,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_groups_upcoming_showtimes_per_film() {
        let clock = Arc::new(ManualClock::new(at(18, 12)));
        let (adapter, provider) = adapter(clock);

        let events = adapter.fetch(&query()).await.unwrap();

        // Lyon is outside the radius; two days fetched for the Rex only
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        let playtime = events.iter().find(|e| e.title == "Playtime").unwrap();
        assert_eq!(playtime.start, Some(at(18, 14)));
        assert!(playtime.description.as_deref().unwrap().contains("19/10 20:00"));
        // 09:00 today already started; tomorrow's screening remains
        let oncle = events.iter().find(|e| e.title == "Mon Oncle").unwrap();
        assert_eq!(oncle.start, Some(at(19, 9)));
        assert!(events.iter().all(|e| e.point().is_some()));
    }

    #[tokio::test]
    async fn test_showtimes_cached_for_an_hour() {
        let clock = Arc::new(ManualClock::new(at(18, 12)));
        let (adapter, provider) = adapter(clock.clone());

        adapter.fetch(&query()).await.unwrap();
        adapter.fetch(&query()).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        clock.advance(ChronoDuration::minutes(61));
        adapter.fetch(&query()).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }
}

//! Coordinate resolution and radius filtering shared by the adapters.

use log::debug;

use crate::geo::haversine_km;
use crate::geocode::Geocoder;
use crate::models::{Event, NearbyQuery};

/// Computes `distance_km` from the query center, drops events without
/// coordinates or beyond the radius, and sorts by `(distance, start)`.
///
/// Upstream filters are bounding boxes, so this is the membership test.
pub fn within_radius(events: Vec<Event>, query: &NearbyQuery) -> Vec<Event> {
    let mut kept: Vec<Event> = events
        .into_iter()
        .filter_map(|mut event| {
            let distance = haversine_km(query.center, event.point()?);
            if distance > query.radius_km {
                return None;
            }
            event.distance_km = Some(distance);
            Some(event)
        })
        .collect();
    kept.sort_by(Event::cmp_distance_then_start);
    kept
}

/// Resolves coordinates for events that lack them, then applies
/// [`within_radius`]. Events no tier can place are dropped.
pub async fn locate_within_radius(
    events: Vec<Event>,
    query: &NearbyQuery,
    geocoder: &dyn Geocoder,
) -> Vec<Event> {
    let mut located = Vec::with_capacity(events.len());
    for mut event in events {
        if event.point().is_none() {
            match geocoder.resolve(&event.geo_query()).await {
                Ok(result) => event.set_point(result.point()),
                Err(e) => {
                    debug!("Dropping '{}' ({}): {}", event.title, event.id, e);
                    continue;
                }
            }
        }
        located.push(event);
    }
    within_radius(located, query)
}

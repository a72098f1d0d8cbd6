//! Great-circle distance and bounding boxes.
//!
//! Every membership and sort decision in the crate uses [`haversine_km`];
//! upstream filters are bounding boxes (supersets of the circle) and must be
//! followed by a haversine check.

use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

/// Mean Earth radius used by every distance computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Axis-aligned latitude/longitude box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub north_east: GeoPoint,
    pub south_west: GeoPoint,
}

impl BoundingBox {
    /// Box from explicit `(min_lat, min_lng, max_lat, max_lng)` bounds.
    pub const fn from_bounds(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            north_east: GeoPoint {
                latitude: max_lat,
                longitude: max_lng,
            },
            south_west: GeoPoint {
                latitude: min_lat,
                longitude: min_lng,
            },
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.latitude >= self.south_west.latitude
            && point.latitude <= self.north_east.latitude
            && point.longitude >= self.south_west.longitude
            && point.longitude <= self.north_east.longitude
    }

    /// Grows the box by `margin_km` on every side.
    pub fn expand_km(&self, margin_km: f64) -> Self {
        let lat_delta = (margin_km / EARTH_RADIUS_KM).to_degrees();
        // Widest latitude of the box gives the smallest degree-per-km ratio
        let widest = self
            .north_east
            .latitude
            .abs()
            .max(self.south_west.latitude.abs())
            .min(89.9);
        let lng_delta = longitude_delta(margin_km, widest);

        Self::from_bounds(
            (self.south_west.latitude - lat_delta).max(-90.0),
            (self.south_west.longitude - lng_delta).max(-180.0),
            (self.north_east.latitude + lat_delta).min(90.0),
            (self.north_east.longitude + lng_delta).min(180.0),
        )
    }
}

/// Box enclosing the circle of `radius_km` around `center`.
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let lat_delta = (radius_km / EARTH_RADIUS_KM).to_degrees();
    let lng_delta = longitude_delta(radius_km, center.latitude);

    BoundingBox::from_bounds(
        center.latitude - lat_delta,
        center.longitude - lng_delta,
        center.latitude + lat_delta,
        center.longitude + lng_delta,
    )
}

fn longitude_delta(distance_km: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos();
    if cos_lat <= f64::EPSILON {
        return 180.0;
    }
    (distance_km / (EARTH_RADIUS_KM * cos_lat)).to_degrees().min(180.0)
}

//! Great-circle math and the administrative region model.
//!
//! - `distance` - haversine distance and bounding boxes
//! - `regions` - postal code → region code, per-region plausibility boxes

mod distance;
mod regions;

pub use distance::{bounding_box, haversine_km, BoundingBox, EARTH_RADIUS_KM};
pub use regions::{extract_postal_code, region_from_postal_code, Plausibility, RegionTable};

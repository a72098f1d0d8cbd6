//! Aggregation models
//!
//! This module contains the core data types shared by every component:
//! - `types` - Type aliases for common identifiers (SourceId, RegionCode)
//! - `event` - The normalized listing shape (Event) and request types (NearbyQuery, DateWindow)
//! - `geo` - Coordinates and geocoding request/response types (GeoPoint, GeoQuery, GeoResult)

mod event;
mod geo;
mod types;

pub use event::{DateWindow, Event, NearbyQuery};
pub use geo::{ConfidenceSource, GeoPoint, GeoQuery, GeoResult};
pub use types::{RegionCode, SourceId};

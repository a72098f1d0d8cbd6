//! Source adapters.
//!
//! Every upstream is wrapped in a [`SourceAdapter`] producing events
//! that have coordinates, lie inside the radius and are sorted:
//!
//! - [`spatial`] - listings in a store with a spatial index
//! - [`agenda`] - paginated agenda directory with per-channel fan-out
//! - [`cinema`] - curated venue catalog plus rate-limited showtimes

pub mod agenda;
pub mod cinema;
pub mod placement;
pub mod spatial;
mod traits;

pub use traits::SourceAdapter;

//! Curated-catalog source: cinema venues and their showtimes.

mod adapter;
mod provider;

pub use adapter::{CinemaAdapter, CinemaConfig};
pub use provider::{HttpShowtimeProvider, Showtime, ShowtimeProvider};

pub const CINEMA_SOURCE: &str = "cinema";

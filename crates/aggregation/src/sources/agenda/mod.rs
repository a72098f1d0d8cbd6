//! Paginated agenda directory source.
//!
//! The directory lists dozens of independently queryable channels. Each
//! request ranks them, queries the top ones in parallel under a per-channel
//! deadline, places coordinate-less events through the geocoder and keeps
//! what falls inside the radius.

mod adapter;
mod client;
mod models;

pub use adapter::{rank_channels, AgendaAdapter, AgendaConfig};
pub use client::{AgendaDirectory, ChannelRequest, OpenAgendaClient, DEFAULT_BASE_URL};
pub use models::{
    parse_timestamp, AgendaChannel, AgendaEvent, AgendaLocation, Coordinate, LocalizedText,
    Timing, Uid,
};

pub const AGENDA_SOURCE: &str = "agenda";

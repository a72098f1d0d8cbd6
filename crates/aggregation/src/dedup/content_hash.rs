//! Content hash of the semantically meaningful fields of an event.

use sha2::{Digest, Sha256};

use crate::models::Event;

const FIELD_SEPARATOR: u8 = 0x1f;

/// Hex SHA-256 over title, category, dates, location, description and
/// organizer.
///
/// Identity, coordinates, distance and source metadata are excluded, so two
/// submissions of the same payload hash equal whatever id they carry or
/// however they were geocoded.
pub fn content_hash(event: &Event) -> String {
    let start = event.start.map(|t| t.to_rfc3339());
    let end = event.end.map(|t| t.to_rfc3339());
    let fields = [
        Some(event.title.as_str()),
        event.category.as_deref(),
        start.as_deref(),
        end.as_deref(),
        event.venue_name.as_deref(),
        event.address.as_deref(),
        event.city.as_deref(),
        event.postal_code.as_deref(),
        event.description.as_deref(),
        event.organizer.as_deref(),
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.map(str::trim).unwrap_or_default().as_bytes());
        hasher.update([FIELD_SEPARATOR]);
    }
    hex::encode(hasher.finalize())
}

//! Agenda directory payloads.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

use super::AGENDA_SOURCE;

const DEFAULT_EVENT_TITLE: &str = "Événement";
const DEFAULT_CHANNEL_TITLE: &str = "Agenda";

/// Text that is either plain or keyed by language.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(std::collections::BTreeMap<String, String>),
}

impl LocalizedText {
    /// French, then English, then any other non-empty language.
    pub fn pick(&self) -> Option<&str> {
        match self {
            Self::Plain(text) => Some(text.as_str()).filter(|t| !t.trim().is_empty()),
            Self::Localized(by_lang) => ["fr", "en"]
                .iter()
                .filter_map(|lang| by_lang.get(*lang))
                .chain(by_lang.values())
                .map(String::as_str)
                .find(|t| !t.trim().is_empty()),
        }
    }
}

/// Identifiers are numbers in the API but strings in older snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uid {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// An independently queryable agenda.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgendaChannel {
    pub uid: Uid,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<LocalizedText>,
    /// Curated (official) channels are queried first.
    #[serde(default)]
    pub official: bool,
}

impl AgendaChannel {
    pub fn display_title(&self) -> &str {
        self.title
            .as_ref()
            .and_then(LocalizedText::pick)
            .unwrap_or(DEFAULT_CHANNEL_TITLE)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChannelPage {
    #[serde(default)]
    pub agendas: Vec<AgendaChannel>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventPage {
    #[serde(default)]
    pub events: Vec<AgendaEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Timing {
    #[serde(default)]
    pub begin: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Coordinates arrive as numbers or numeric strings.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(f64),
    Text(#[serde(with = "coordinate_text")] f64),
}

impl Coordinate {
    pub fn value(self) -> f64 {
        match self {
            Self::Number(v) | Self::Text(v) => v,
        }
    }
}

mod coordinate_text {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaLocation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<Coordinate>,
    #[serde(default)]
    pub longitude: Option<Coordinate>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AgendaEvent {
    pub uid: Uid,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<LocalizedText>,
    #[serde(default)]
    pub description: Option<LocalizedText>,
    #[serde(default)]
    pub timings: Vec<Timing>,
    #[serde(default)]
    pub location: Option<AgendaLocation>,
}

impl AgendaEvent {
    /// Normalized event; coordinates stay empty when the location has none.
    pub fn into_event(self, channel: &AgendaChannel) -> Event {
        let location = self.location.unwrap_or_default();
        let first = self.timings.first();
        let source_url = match (channel.slug.as_deref(), self.slug.as_deref()) {
            (Some(agenda), Some(event)) => {
                Some(format!("https://openagenda.com/{}/events/{}", agenda, event))
            }
            _ => None,
        };

        Event {
            id: format!("oa-{}", self.uid),
            title: self
                .title
                .as_ref()
                .and_then(LocalizedText::pick)
                .unwrap_or(DEFAULT_EVENT_TITLE)
                .to_string(),
            category: None,
            description: self
                .description
                .as_ref()
                .and_then(LocalizedText::pick)
                .map(str::to_string),
            organizer: Some(channel.display_title().to_string()),
            start: first.and_then(|t| t.begin.as_deref()).and_then(parse_timestamp),
            end: first.and_then(|t| t.end.as_deref()).and_then(parse_timestamp),
            venue_name: location.name,
            address: location.address,
            city: location.city,
            postal_code: location.postal_code,
            latitude: location.latitude.map(Coordinate::value),
            longitude: location.longitude.map(Coordinate::value),
            distance_km: None,
            source_name: AGENDA_SOURCE.to_string(),
            source_url,
        }
    }
}

/// RFC 3339, `+0200` offsets, or naive timestamps taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

//! Tourism listing records as found in the bulk export used for imports.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

/// Provenance recorded on imported listings.
pub const LISTING_SOURCE_NAME: &str = "datatourisme";

/// One row of the listing export. Field aliases accept both the export's
/// French column names and the English ones.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(alias = "uri")]
    pub id: String,
    #[serde(alias = "nom")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "date_debut")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "date_fin")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, alias = "adresse")]
    pub address: Option<String>,
    #[serde(default, alias = "commune")]
    pub city: Option<String>,
    #[serde(default, alias = "code_postal")]
    pub postal_code: Option<String>,
    /// `#`-separated free text (phone, mail, website...).
    #[serde(default)]
    pub contacts: Option<String>,
}

impl ListingRecord {
    /// Normalized event. The validity window spans whole days.
    pub fn into_event(self) -> Event {
        let source_url = self.contacts.as_deref().and_then(website_from_contacts);
        Event {
            id: self.id,
            title: self.title,
            category: self.category,
            description: self.description,
            organizer: None,
            start: self.start_date.map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
            end: self.end_date.map(end_of_day),
            venue_name: None,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            latitude: self.latitude,
            longitude: self.longitude,
            distance_km: None,
            source_name: LISTING_SOURCE_NAME.to_string(),
            source_url,
        }
    }
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(last))
}

/// First `#`-separated part of a contacts field that is a web address.
pub fn website_from_contacts(contacts: &str) -> Option<String> {
    contacts
        .split('#')
        .map(str::trim)
        .find(|part| part.starts_with("http"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_from_contacts() {
        assert_eq!(
            website_from_contacts("#0142000000#contact@lieu.fr#https://lieu.fr/agenda").as_deref(),
            Some("https://lieu.fr/agenda")
        );
        assert_eq!(website_from_contacts("0142000000#contact@lieu.fr"), None);
    }

    #[test]
    fn test_record_accepts_export_column_names() {
        let raw = r##"{
            "uri": "https://data.datatourisme.fr/10/abc",
            "nom": "Fête des vendanges",
            "date_debut": "2026-10-01",
            "date_fin": "2026-10-31",
            "latitude": 48.8867, "longitude": 2.3431,
            "commune": "Paris", "code_postal": "75018",
            "contacts": "#https://fetedesvendangesdemontmartre.com"
        }"##;
        let record: ListingRecord = serde_json::from_str(raw).unwrap();
        let event = record.into_event();

        assert_eq!(event.title, "Fête des vendanges");
        assert_eq!(event.city.as_deref(), Some("Paris"));
        assert_eq!(event.source_name, LISTING_SOURCE_NAME);
        assert_eq!(
            event.source_url.as_deref(),
            Some("https://fetedesvendangesdemontmartre.com")
        );
        assert_eq!(
            event.end.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2026-10-31 23:59:59"
        );
    }
}

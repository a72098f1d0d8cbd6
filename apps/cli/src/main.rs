mod config;
mod main_lib;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gedeon_aggregation::sources::spatial::ListingRecord;
use gedeon_aggregation::{Event, GeoPoint, DEFAULT_HORIZON_DAYS, DEFAULT_RADIUS_KM};
use serde::Serialize;

use config::Config;
use main_lib::{build_state, init_tracing};

#[derive(Parser)]
#[command(name = "gedeon", version, about = "Nearby event discovery")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Events around a point, merged from every registered source
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, default_value_t = DEFAULT_RADIUS_KM)]
        radius: f64,
        #[arg(long, default_value_t = DEFAULT_HORIZON_DAYS)]
        days: u32,
    },
    /// Stores a scanned or user-entered event read from a JSON file
    Submit {
        file: PathBuf,
        /// Device position used when the event cannot be geocoded
        #[arg(long, allow_hyphen_values = true, requires = "device_lon")]
        device_lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "device_lat")]
        device_lon: Option<f64>,
    },
    /// Soft-deletes a stored event
    Delete { id: String },
    /// Bulk upserts listings from a JSON array export
    Import { file: PathBuf },
    /// Listing counts and busiest cities
    Stats,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    match cli.command {
        Command::Nearby {
            lat,
            lon,
            radius,
            days,
        } => {
            let result = state
                .service
                .nearby(Some(GeoPoint::new(lat, lon)), radius, days)
                .await?;
            print_json(&result)?;
        }
        Command::Submit {
            file,
            device_lat,
            device_lon,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let candidate: Event = serde_json::from_str(&raw)
                .with_context(|| format!("parsing event from {}", file.display()))?;
            let device_point = device_lat
                .zip(device_lon)
                .map(|(lat, lon)| GeoPoint::new(lat, lon));
            let outcome = state.service.submit(candidate, device_point).await?;
            print_json(&outcome)?;
        }
        Command::Delete { id } => {
            if state.service.soft_delete(&id).await? {
                tracing::info!("Event {} deleted", id);
            } else {
                anyhow::bail!("no live event with id {}", id);
            }
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let records: Vec<ListingRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing listings from {}", file.display()))?;
            let summary = state.repository.import_listings(records).await?;
            print_json(&summary)?;
        }
        Command::Stats => {
            print_json(&state.repository.stats()?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_nearby_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["gedeon", "nearby", "--lat", "48.85", "--lon", "-1.5"])
            .unwrap();
        match cli.command {
            Command::Nearby {
                lon, radius, days, ..
            } => {
                assert_eq!(lon, -1.5);
                assert_eq!(radius, DEFAULT_RADIUS_KM);
                assert_eq!(days, DEFAULT_HORIZON_DAYS);
            }
            _ => panic!("expected nearby"),
        }
    }

    #[test]
    fn test_device_position_needs_both_components() {
        let result = Cli::try_parse_from(["gedeon", "submit", "scan.json", "--device-lat", "48.8"]);
        assert!(result.is_err());
    }
}

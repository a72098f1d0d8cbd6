mod model;
mod repository;

pub use model::{
    format_timestamp, parse_timestamp, CityCount, EventContentDB, EventDB, EventStats,
    ImportSummary,
};
pub use repository::EventRepository;

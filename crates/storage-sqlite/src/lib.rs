//! SQLite storage implementation for Gedeon.
//!
//! This crate provides the persisted event pool using Diesel ORM with SQLite:
//! - Database connection pooling and management
//! - Diesel migrations
//! - A single writer actor serializing every write in its own transaction
//! - [`EventRepository`], implementing both the write-path `EventPool` and the
//!   `SpatialStore` read by the spatial source adapter
//!
//! # Architecture
//!
//! ```text
//! aggregation (engine)
//!       │
//!       ▼
//! storage-sqlite (this crate)
//!       │
//!       ▼
//!   SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod events;
pub mod schema;

pub use db::{
    create_pool, get_connection, init, open, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use errors::{IntoDiscovery, StorageError};
pub use events::{CityCount, EventRepository, EventStats, ImportSummary};

//! Gedeon Aggregation Crate
//!
//! Merges cultural listings from heterogeneous upstreams into one
//! geographically filtered, deduplicated feed.
//!
//! # Overview
//!
//! The engine:
//! - Queries every source concurrently, each under its own deadline
//! - Resolves missing coordinates through a cached, prioritized tier chain
//! - Detects resubmissions of the same real-world event on the write path
//! - Produces one distance-sorted, capped result set
//!
//! # Architecture
//!
//! ```text
//!                        +------------------------+
//!                        |  AggregationScheduler  |  (bulkhead per source)
//!                        +------------------------+
//!                          |          |         |
//!                          v          v         v
//!                  +---------+  +---------+  +---------+
//!                  | spatial |  | agenda  |  | cinema  |  (SourceAdapter)
//!                  +---------+  +---------+  +---------+
//!                                    |            |
//!                                    v            |
//!                        +------------------------+
//!                        |    GeocodeResolver     |  (cache, then tiers)
//!                        +------------------------+
//!                                    |
//!                                    v
//!                        +------------------------+
//!                        |    ResultAssembler     |  (sort, dedup, cap)
//!                        +------------------------+
//! ```
//!
//! The write path (`DiscoveryService::submit`) geocodes a submission with
//! the same resolver and hands it to an [`EventPool`], where the
//! [`DeduplicationMatcher`] decides between insert and replace.
//!
//! # Core Types
//!
//! - [`Event`] - Normalized listing produced by every adapter
//! - [`NearbyQuery`] - Validated center, radius and date window
//! - [`GeoQuery`] / [`GeoResult`] - Geocoding request and answer
//! - [`NearbyResult`] - Events plus per-source counts and diagnostics

pub mod assembler;
pub mod cache;
pub mod dedup;
pub mod errors;
pub mod geo;
pub mod geocode;
pub mod models;
pub mod scheduler;
pub mod service;
pub mod sources;

// Re-export all public types from models
pub use models::{
    ConfidenceSource, DateWindow, Event, GeoPoint, GeoQuery, GeoResult, NearbyQuery, RegionCode,
    SourceId,
};

pub use errors::{DiscoveryError, Result, RetryClass};

// Re-export the read and write paths
pub use assembler::{AssemblerConfig, ResultAssembler};
pub use dedup::{
    content_hash, DedupConfig, DeduplicationMatcher, EventPool, InMemoryEventPool, StoredEvent,
    SubmitAction, SubmitOutcome,
};
pub use geocode::{GeocodeConfig, GeocodeResolver, Geocoder, UnknownRegionPolicy};
pub use scheduler::{
    AggregationDiagnostics, AggregationScheduler, RateLimiter, SchedulerConfig, SourceReport,
    SourceStatus,
};
pub use service::{
    DiscoveryService, NearbyResult, DEFAULT_HORIZON_DAYS, DEFAULT_RADIUS_KM, SUBMISSION_SOURCE,
};
pub use sources::SourceAdapter;

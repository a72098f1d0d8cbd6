//! Top-level fan-out over source adapters.
//!
//! - `aggregate` - [`AggregationScheduler`], per-source deadlines and the merge step
//! - `diagnostics` - per-source outcome reports
//! - `rate_limiter` - token buckets shared by adapters that call throttled upstreams

mod aggregate;
mod diagnostics;
mod rate_limiter;

pub use aggregate::{Aggregation, AggregationScheduler, SchedulerConfig};
pub use diagnostics::{AggregationDiagnostics, SourceReport, SourceStatus};
pub use rate_limiter::{RateLimiter, UpstreamLimit};

//! Error types and fallback classification for the aggregation crate.
//!
//! This module provides:
//! - [`DiscoveryError`]: The main error enum for all aggregation operations
//! - [`RetryClass`]: Classification for determining fallback behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Type alias for Result using [`DiscoveryError`].
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur while aggregating, geocoding or submitting events.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The request is malformed (missing or out-of-range center, bad radius).
    /// This is the only error surfaced to callers of `nearby`.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A source adapter failed. Recorded as a zero count, never propagated
    /// out of the scheduler.
    #[error("Source unavailable: {source_name} - {message}")]
    SourceUnavailable {
        /// The source that failed
        source_name: String,
        /// The failure description
        message: String,
    },

    /// A source adapter or upstream call exceeded its deadline.
    #[error("Timeout: {source_name}")]
    SourceTimeout {
        /// The source or upstream that timed out
        source_name: String,
    },

    /// No geocoding tier could place the record.
    #[error("Record unresolvable: {0}")]
    RecordUnresolvable(String),

    /// A geocoder answer fell outside the expected region's bounding box.
    #[error("Implausible geocoder result for region {region}")]
    ImplausibleResult {
        /// The region the answer was checked against
        region: String,
    },

    /// The external geocoder returned an error.
    #[error("Geocoder error: {provider} - {message}")]
    Geocoder {
        /// The geocoding service
        provider: String,
        /// The error message from the service
        message: String,
    },

    /// An upstream rejected the request because of throttling.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The upstream that rate limited the request
        provider: String,
    },

    /// A submission is byte-identical (same content hash) to a live event.
    #[error("Duplicate content, already stored as {existing_id}")]
    DuplicateContent {
        /// Identifier of the event already carrying this content hash
        existing_id: String,
    },

    /// Two submissions raced on the same dedup target.
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A cache file could not be read or written.
    #[error("Cache error: {0}")]
    Cache(String),

    /// A network error occurred while communicating with an upstream.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A local file operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Returns the fallback classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use gedeon_aggregation::errors::{DiscoveryError, RetryClass};
    ///
    /// let error = DiscoveryError::RateLimited { provider: "NOMINATIM".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextTier);
    ///
    /// let error = DiscoveryError::InvalidRequest("missing center".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Upstream trouble - another tier may still answer
            Self::SourceUnavailable { .. }
            | Self::SourceTimeout { .. }
            | Self::ImplausibleResult { .. }
            | Self::Geocoder { .. }
            | Self::RateLimited { .. }
            | Self::Network(_)
            | Self::RecordUnresolvable(_) => RetryClass::NextTier,

            // Local or request-level failures - terminal
            Self::InvalidRequest(_)
            | Self::DuplicateContent { .. }
            | Self::PersistenceConflict(_)
            | Self::Storage(_)
            | Self::Cache(_)
            | Self::Serialization(_)
            | Self::Io(_) => RetryClass::Never,
        }
    }

    /// Builds a [`DiscoveryError::SourceUnavailable`] from any displayable error.
    pub fn source_unavailable(source_name: &str, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped here and converted to
//! [`DiscoveryError`] at the crate boundary.

use diesel::result::Error as DieselError;
use gedeon_aggregation::DiscoveryError;
use thiserror::Error;

/// Errors internal to the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Writer actor unavailable: {0}")]
    WriterUnavailable(String),

    /// An engine error raised inside a write job. Passed through untouched so
    /// callers still see e.g. `DuplicateContent`.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl From<StorageError> for DiscoveryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Discovery(e) => e,
            StorageError::QueryFailed(DieselError::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            )) => DiscoveryError::PersistenceConflict(info.message().to_string()),
            other => DiscoveryError::Storage(other.to_string()),
        }
    }
}

/// Converts Diesel and pool results into engine results.
pub trait IntoDiscovery<T> {
    fn into_discovery(self) -> gedeon_aggregation::Result<T>;
}

impl<T> IntoDiscovery<T> for std::result::Result<T, DieselError> {
    fn into_discovery(self) -> gedeon_aggregation::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoDiscovery<T> for std::result::Result<T, r2d2::Error> {
    fn into_discovery(self) -> gedeon_aggregation::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_pass_through() {
        let err = StorageError::from(DiscoveryError::DuplicateContent {
            existing_id: "abc".to_string(),
        });
        match DiscoveryError::from(err) {
            DiscoveryError::DuplicateContent { existing_id } => assert_eq!(existing_id, "abc"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_found_becomes_storage_error() {
        let err: DiscoveryError = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, DiscoveryError::Storage(_)));
    }
}

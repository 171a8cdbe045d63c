//! Core error types for stride-core.
//!
//! Every failure the core can observe maps onto one of a few categories:
//! missing activity data, persisted state that fails an invariant, and
//! writes the store could not make durable. None of these are meant to reach
//! the user; callers degrade them to "no change this cycle".

use std::path::PathBuf;
use thiserror::Error;

use crate::day::DayKey;

/// Core error type for stride-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The activity source could not answer for this day.
    ///
    /// Transient. Callers must treat the day as unknown, never as zero.
    #[error("Activity data unavailable for {day}: {reason}")]
    DataUnavailable { day: DayKey, reason: String },

    /// Persisted state failed a documented invariant on load.
    #[error("Invariant violated for '{key}': {message}")]
    InvariantViolation { key: String, message: String },

    /// The store did not durably accept a write.
    #[error("Failed to write '{key}': {message}")]
    StoreWriteFailure { key: String, message: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The connection mutex was poisoned by a panicking writer
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Home/config directory could not be prepared
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl CoreError {
    /// Whether retrying on the next trigger can succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::DataUnavailable { .. }
                | CoreError::StoreWriteFailure { .. }
                | CoreError::Database(DatabaseError::Locked)
        )
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_unavailable_mentions_day() {
        let day = DayKey::parse("2024-03-09").unwrap();
        let err = CoreError::DataUnavailable {
            day,
            reason: "permission revoked".into(),
        };
        assert_eq!(
            err.to_string(),
            "Activity data unavailable for 2024-03-09: permission revoked"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn invariant_violation_is_not_transient() {
        let err = CoreError::InvariantViolation {
            key: "passes.balance".into(),
            message: "7 outside [0, 3]".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn no_rows_maps_to_query_failed() {
        let err: DatabaseError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
    }
}

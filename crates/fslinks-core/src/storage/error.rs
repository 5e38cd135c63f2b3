//! Store error handling
//!
//! Provides typed errors for link store operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during link store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database file could not be opened or its schema established
    #[error("Failed to open link database '{path}': {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Data directory could not be created
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read-only open of a file that has no links table
    #[error("'{path}' is not a link database (no links table)")]
    MissingSchema { path: PathBuf },

    /// Mutating call on a read-only store
    #[error("Cannot {operation}: the link store is open read-only")]
    ReadOnly { operation: &'static str },

    /// Any call after `close()`
    #[error("The link store is closed")]
    Closed,

    /// Write lock not acquired within the busy timeout
    #[error("Database is busy (locked by another process): {0}")]
    Busy(#[source] rusqlite::Error),

    /// Constraint violation; the write was rolled back
    #[error("Constraint violation: {0}")]
    Constraint(#[source] rusqlite::Error),

    /// Other SQLite error
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Link path is empty or whitespace
    #[error("Link path cannot be empty")]
    EmptyPath,

    /// Reorder list is not a permutation of the stored ids
    #[error("Invalid reorder: {reason}")]
    InvalidReorder { reason: String },

    /// Import document rejected; nothing was written
    #[error("Invalid import: {reason}")]
    InvalidImport { reason: String },

    /// Reading or writing an import/export file failed
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Import/export file is not valid JSON for the interchange format
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<rusqlite::Error> for StoreError {
    /// Classify SQLite failures by their primary result code
    fn from(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Busy(error)
            }
            Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(error),
            _ => StoreError::Database(error),
        }
    }
}

impl StoreError {
    /// Check if the caller can retry or continue using the store
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::ReadOnly { .. }
                | StoreError::Busy(_)
                | StoreError::Constraint(_)
                | StoreError::EmptyPath
                | StoreError::InvalidReorder { .. }
                | StoreError::InvalidImport { .. }
                | StoreError::Io { .. }
                | StoreError::Json { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::Busy(_) => {
                Some("Another process is writing to the database. Wait a moment and try again.")
            }
            StoreError::ReadOnly { .. } => {
                Some("Reopen the store without read-only mode to make changes.")
            }
            StoreError::Init { .. } | StoreError::CreateDirectory { .. } => {
                Some("Check that the path exists and you have read/write permissions.")
            }
            StoreError::InvalidReorder { .. } => {
                Some("Pass every link id exactly once, in the desired order.")
            }
            StoreError::EmptyPath => Some("Give the link a file, folder or network path."),
            StoreError::Closed => Some("Open a new store instance."),
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_error(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_classification() {
        let err = StoreError::from(sqlite_error(ffi::SQLITE_BUSY));
        assert!(matches!(err, StoreError::Busy(_)));
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());

        let err = StoreError::from(sqlite_error(ffi::SQLITE_LOCKED));
        assert!(matches!(err, StoreError::Busy(_)));
    }

    #[test]
    fn test_constraint_classification() {
        let err = StoreError::from(sqlite_error(ffi::SQLITE_CONSTRAINT_CHECK));
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_other_errors_are_database_errors() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_read_only_display() {
        let err = StoreError::ReadOnly {
            operation: "add link",
        };
        let msg = err.to_string();
        assert!(msg.contains("read-only"));
        assert!(msg.contains("add link"));
    }

    #[test]
    fn test_empty_path_is_recoverable() {
        let err = StoreError::EmptyPath;
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("path"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_init_display() {
        let err = StoreError::Init {
            path: PathBuf::from("/data/links.db"),
            source: sqlite_error(ffi::SQLITE_CANTOPEN),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/links.db"));
        assert!(!err.is_recoverable());
    }
}

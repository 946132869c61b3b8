//! Local store error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the local store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored value could not be parsed (only surfaced under the strict policy)
    #[error("Corrupt data under key {key}: {reason}")]
    Corruption { key: String, reason: String },

    /// Another writer advanced the document while an update was in flight
    #[error("Concurrent write detected: expected revision {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },

    /// Key is not valid for the backend (empty, path separators, ...)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Conflict {
            expected: 3,
            found: 5,
        };
        assert_eq!(
            err.to_string(),
            "Concurrent write detected: expected revision 3, found 5"
        );

        let err = StoreError::InvalidKey("../etc".to_string());
        assert_eq!(err.to_string(), "Invalid key: ../etc");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}

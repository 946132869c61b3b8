//! Community error types

use crate::storage::StoreError;
use thiserror::Error;

/// Errors returned by community operations. No operation mutates stored
/// state when it returns one of these.
#[derive(Error, Debug)]
pub enum CommunityError {
    /// A required field is missing or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced room, message or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registration with a username that is already taken
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    /// Unknown username or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The operation needs a signed-in user
    #[error("You must be signed in to {0}")]
    NotSignedIn(&'static str),

    /// Password hashing failed
    #[error("Credential error: {0}")]
    Credential(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for community operations
pub type CommunityResult<T> = Result<T, CommunityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CommunityError::NotSignedIn("create a room").to_string(),
            "You must be signed in to create a room"
        );
        assert_eq!(
            CommunityError::UsernameTaken("ada".into()).to_string(),
            "Username already exists: ada"
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: CommunityError = StoreError::Lock("poisoned".into()).into();
        assert!(matches!(err, CommunityError::Store(_)));
    }
}

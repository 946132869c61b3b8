//! Password hashing
//!
//! New passwords are stored as Argon2id PHC strings. Records written by
//! the browser client hold the plaintext password; those still verify by
//! string equality and are rehashed on the next successful sign-in.

use crate::community::error::{CommunityError, CommunityResult};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};

/// Hashes and verifies passwords
#[derive(Clone, Default)]
pub struct Credentials {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

impl Credentials {
    /// Argon2id with explicit cost parameters
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> CommunityResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CommunityError::Credential(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash with a fresh random salt
    pub fn hash(&self, password: &str) -> CommunityResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| CommunityError::Credential(e.to_string()))
    }

    /// Check `submitted` against a stored hash or legacy plaintext
    pub fn verify(&self, stored: &str, submitted: &str) -> bool {
        if !is_hashed(stored) {
            return stored == submitted;
        }
        match PasswordHash::new(stored) {
            Ok(hash) => self
                .argon2
                .verify_password(submitted.as_bytes(), &hash)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }
}

/// Whether a stored password is a PHC hash rather than legacy plaintext
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with("$argon2")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Credentials {
        Credentials::new(64, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let creds = fast();
        let hash = creds.hash("hunter2").unwrap();
        assert!(is_hashed(&hash));
        assert!(creds.verify(&hash, "hunter2"));
        assert!(!creds.verify(&hash, "hunter3"));
    }

    #[test]
    fn test_salted() {
        let creds = fast();
        assert_ne!(creds.hash("same").unwrap(), creds.hash("same").unwrap());
    }

    #[test]
    fn test_legacy_plaintext() {
        let creds = fast();
        assert!(!is_hashed("pw"));
        assert!(creds.verify("pw", "pw"));
        assert!(!creds.verify("pw", "PW"));
    }

    #[test]
    fn test_malformed_hash_rejects() {
        assert!(!fast().verify("$argon2id$garbage", "anything"));
    }

    #[test]
    fn test_invalid_params() {
        assert!(Credentials::new(0, 0, 0).is_err());
    }
}

//! Password hashing
//!
//! Argon2id in PHC string format. Hashing is CPU-bound, so both operations
//! run on the blocking thread pool.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::domain::LedgerError;

/// Hash a password with a fresh random salt
pub async fn hash_password(password: String) -> Result<String, LedgerError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| LedgerError::Internal(format!("password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| LedgerError::Internal(format!("password hashing task failed: {}", e)))?
}

/// Check a password against a stored hash.
///
/// A stored value that is not a valid PHC string never matches.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, LedgerError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is unusable");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| LedgerError::Internal(format!("password verification task failed: {}", e)))
}

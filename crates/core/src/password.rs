//! Argon2id password hashing and verification.
//!
//! Hashes use the Argon2id variant with a random salt from [`OsRng`]. The PHC
//! string format is stored so that algorithm parameters and salt travel with
//! the hash itself.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Failure to produce or parse a password hash.
///
/// Wraps the message of the underlying `password_hash` error, which does not
/// implement `std::error::Error` without that crate's `std` feature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HashingError(String);

impl From<argon2::password_hash::Error> for HashingError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self(err.to_string())
    }
}

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string (algorithm, params, salt and hash).
pub fn hash_password(password: &str) -> Result<String, HashingError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch and `Err` only when
/// the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashingError> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

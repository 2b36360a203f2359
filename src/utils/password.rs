// src/utils/password.rs
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::errors::{GrievanceError, GrievanceResult};

const MIN_PASSWORD_CHARS: usize = 6;

/// Hashes with Argon2id and a random salt, returning the PHC string.
pub fn hash_password(password: &str) -> GrievanceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| GrievanceError::internal_error(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a wrong password; an unparseable stored hash is an error.
pub fn verify_password(password: &str, stored: &str) -> GrievanceResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| GrievanceError::internal_error(format!("Failed to parse password hash: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(GrievanceError::internal_error(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

pub fn is_acceptable(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

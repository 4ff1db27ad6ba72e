//! Password hashing and verification using Argon2
//!
//! Farmer passwords are stored only as PHC-formatted argon2id hashes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::FarmError;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, FarmError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| FarmError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
///
/// A malformed stored hash is an error, a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, FarmError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| FarmError::Internal(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("tractor42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("tractor42"));

        assert!(verify_password("tractor42", &hash).unwrap());
        assert!(!verify_password("tractor43", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "plaintext-in-db").is_err());
    }
}

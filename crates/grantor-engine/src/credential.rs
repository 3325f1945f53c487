use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::SaltString;
use rand::rngs::OsRng;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential hashing failed: {0}")]
    Hash(String),

    #[error("stored credential is malformed: {0}")]
    Malformed(String),
}

pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Digests a password with the given per-user salt into a PHC string.
pub fn digest(password: &str, salt: &str) -> Result<String, CredentialError> {
    let salt = SaltString::from_b64(salt).map_err(|e| CredentialError::Malformed(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Constant-time comparison against a stored PHC string. The salt embedded
/// in the stored value is reused, so this is exactly "recompute with the
/// stored salt and compare".
pub fn verify(password: &str, stored: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored).map_err(|e| CredentialError::Malformed(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

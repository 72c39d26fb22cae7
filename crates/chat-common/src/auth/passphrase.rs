//! Moderator passphrase hashing and verification
//!
//! Elevation compares a passphrase against an Argon2id PHC string from
//! configuration. The plaintext never leaves this module.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Hash a passphrase using Argon2id
///
/// Used by operators to produce `CHAT_MODERATOR_PASSPHRASE_HASH`.
pub fn hash_passphrase(passphrase: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Passphrase hashing failed: {e}")))
}

/// Verify a passphrase against a PHC hash
pub fn verify_passphrase(passphrase: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Config(format!("Invalid moderator passphrase hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(passphrase.as_bytes(), &parsed)
        .is_ok())
}

/// Checks moderator elevation attempts against the configured hash
#[derive(Debug, Clone, Default)]
pub struct PassphraseVerifier {
    hash: Option<String>,
}

impl PassphraseVerifier {
    /// Create a verifier; `None` disables elevation
    #[must_use]
    pub fn new(hash: Option<String>) -> Self {
        Self { hash }
    }

    /// Check whether elevation is possible at all
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.hash.is_some()
    }

    /// Verify a passphrase and return an error if it does not match
    ///
    /// # Errors
    /// `AppError::InvalidCredentials` on mismatch, `AppError::Config` when no
    /// hash is configured or the hash is unreadable
    pub fn verify_or_error(&self, passphrase: &str) -> Result<(), AppError> {
        let hash = self
            .hash
            .as_deref()
            .ok_or_else(|| AppError::Config("moderator passphrase is not configured".to_string()))?;

        if verify_passphrase(passphrase, hash)? {
            Ok(())
        } else {
            Err(AppError::InvalidCredentials)
        }
    }
}

//! Caller identity hashing
//!
//! Raw addresses never leave this module: the limiter and the logs only see
//! the salted SHA-256 digest.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::CALLER_KEY_LEN;

/// Hashed caller identity, 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerKey(String);

impl CallerKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives [`CallerKey`]s from network addresses
#[derive(Clone)]
pub struct IdentityHasher {
    secret: String,
}

impl IdentityHasher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hash `address` with the configured secret.
    ///
    /// An unset secret is a configuration problem, an empty address is the
    /// caller's: both reject the request instead of letting it through ungated.
    pub fn hash(&self, address: &str) -> AppResult<CallerKey> {
        if self.secret.is_empty() {
            return Err(AppError::missing_credentials());
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(AppError::identity_unavailable());
        }

        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(b":");
        hasher.update(self.secret.as_bytes());
        let digest = hex::encode(hasher.finalize());

        if digest.len() != CALLER_KEY_LEN {
            return Err(AppError::identity_unavailable());
        }
        Ok(CallerKey(digest))
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher").field("secret", &"<hidden>").finish()
    }
}

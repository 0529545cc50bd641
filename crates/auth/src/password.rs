//! Credential hashing (bcrypt).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("failed to hash credential: {0}")]
    Hash(String),

    #[error("stored credential hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hashes and compares credentials. Plaintext never leaves this boundary.
pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, plain: &str) -> Result<String, CredentialError>;

    fn compare_password(&self, plain: &str, hash: &str) -> Result<bool, CredentialError>;
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Cost is clamped to bcrypt's accepted range (4..=31).
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(10)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash_password(&self, plain: &str) -> Result<String, CredentialError> {
        bcrypt::hash(plain, self.cost).map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn compare_password(&self, plain: &str, hash: &str) -> Result<bool, CredentialError> {
        bcrypt::verify(plain, hash).map_err(|e| CredentialError::MalformedHash(e.to_string()))
    }
}

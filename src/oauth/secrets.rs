//! One-way hashing of client secrets using Argon2id.
//!
//! Hashes are stored as PHC strings so the parameters used at hashing time
//! travel with the hash. Both operations are CPU bound and run on the blocking
//! thread pool.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use rand::RngCore;

use crate::config::SecretHashCost;
use crate::errors::SecretHashError;

/// Hash and compare client secrets.
#[async_trait]
pub trait SecretHasher: Send + Sync {
    /// Produce a one-way hash of `secret`.
    async fn hash(&self, secret: &str) -> Result<String, SecretHashError>;

    /// Returns `Ok(true)` when `secret` matches `hash`, `Ok(false)` on mismatch.
    async fn compare(&self, hash: &str, secret: &str) -> Result<bool, SecretHashError>;
}

/// Argon2id hasher with a configurable work factor.
#[derive(Clone)]
pub struct Argon2SecretHasher {
    params: Params,
}

impl Argon2SecretHasher {
    pub fn new(cost: SecretHashCost) -> Result<Self, SecretHashError> {
        let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
            .map_err(|e| SecretHashError::InvalidParameters(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

#[async_trait]
impl SecretHasher for Argon2SecretHasher {
    async fn hash(&self, secret: &str) -> Result<String, SecretHashError> {
        let params = self.params.clone();
        let secret = secret.to_string();

        tokio::task::spawn_blocking(move || {
            let mut salt = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut salt);
            let salt = SaltString::encode_b64(&salt)
                .map_err(|e| SecretHashError::HashingFailed(e.to_string()))?;

            Self::argon2(params)
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| SecretHashError::HashingFailed(e.to_string()))
        })
        .await
        .map_err(|e| SecretHashError::TaskFailed(e.to_string()))?
    }

    async fn compare(&self, hash: &str, secret: &str) -> Result<bool, SecretHashError> {
        let params = self.params.clone();
        let hash = hash.to_string();
        let secret = secret.to_string();

        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| SecretHashError::MalformedHash(e.to_string()))?;

            match Self::argon2(params).verify_password(secret.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(SecretHashError::MalformedHash(e.to_string())),
            }
        })
        .await
        .map_err(|e| SecretHashError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2SecretHasher {
    Argon2SecretHasher::new(SecretHashCost {
        iterations: 1,
        memory_kib: 1024,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_compare() {
        let hasher = test_hasher();
        let hash = hasher.hash("correct horse").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("correct horse"));
        assert!(hasher.compare(&hash, "correct horse").await.unwrap());
        assert!(!hasher.compare(&hash, "battery staple").await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = test_hasher();
        let first = hasher.hash("same-secret").await.unwrap();
        let second = hasher.hash("same-secret").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_hash_parameters_travel_with_hash() {
        let weak = test_hasher();
        let stronger = Argon2SecretHasher::new(SecretHashCost {
            iterations: 2,
            memory_kib: 2048,
        })
        .unwrap();

        let hash = weak.hash("portable").await.unwrap();
        assert!(stronger.compare(&hash, "portable").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash() {
        let hasher = test_hasher();
        let err = hasher.compare("not-a-phc-string", "secret").await.unwrap_err();
        assert!(matches!(err, SecretHashError::MalformedHash(_)));
    }

    #[test]
    fn test_invalid_parameters() {
        let result = Argon2SecretHasher::new(SecretHashCost {
            iterations: 0,
            memory_kib: 1024,
        });
        assert!(matches!(result, Err(SecretHashError::InvalidParameters(_))));
    }
}

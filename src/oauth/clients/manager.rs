//! Client persistence with secret hashing and zero-downtime rotation.
//!
//! Secrets reach the manager in plaintext and leave it hashed. Replacing a
//! secret moves the previous hash into `rotated_secrets` in the same write, so
//! both generations authenticate until the history is cleared.

use chrono::Utc;
use std::sync::Arc;

use crate::errors::{ClientRegistrationError, StorageError};
use crate::oauth::secrets::SecretHasher;
use crate::oauth::types::{OAuthClient, Pagination};
use crate::storage::traits::OAuthStorage;

pub struct ClientManager {
    storage: Arc<dyn OAuthStorage>,
    hasher: Arc<dyn SecretHasher>,
    max_rotated_secrets: Option<usize>,
}

fn storage_error(client_id: &str, error: StorageError) -> ClientRegistrationError {
    match error {
        StorageError::NotFound(_) => ClientRegistrationError::ClientNotFound(client_id.to_string()),
        error => ClientRegistrationError::Storage(error),
    }
}

impl ClientManager {
    pub fn new(
        storage: Arc<dyn OAuthStorage>,
        hasher: Arc<dyn SecretHasher>,
        max_rotated_secrets: Option<usize>,
    ) -> Self {
        Self {
            storage,
            hasher,
            max_rotated_secrets,
        }
    }

    async fn hash_secret(&self, secret: &str) -> Result<String, ClientRegistrationError> {
        if secret.is_empty() {
            return Ok(String::new());
        }
        Ok(self.hasher.hash(secret).await?)
    }

    /// Drop the oldest generations beyond the configured cap.
    fn cap_rotated(&self, rotated: &mut Vec<String>) {
        if let Some(max) = self.max_rotated_secrets {
            if rotated.len() > max {
                let excess = rotated.len() - max;
                rotated.drain(..excess);
            }
        }
    }

    /// Hash the plaintext secret in `client` and persist the record.
    pub async fn create_client(&self, client: &mut OAuthClient) -> Result<(), ClientRegistrationError> {
        client.client_secret = self.hash_secret(&client.client_secret).await?;
        client.rotated_secrets.retain(|hash| !hash.is_empty());
        self.storage.store_client(client).await?;

        tracing::info!(client_id = %client.client_id, "client created");
        Ok(())
    }

    pub async fn get_client(&self, client_id: &str) -> Result<OAuthClient, ClientRegistrationError> {
        self.storage
            .get_client(client_id)
            .await?
            .ok_or_else(|| ClientRegistrationError::ClientNotFound(client_id.to_string()))
    }

    pub async fn get_clients(
        &self,
        pagination: Pagination,
    ) -> Result<Vec<OAuthClient>, ClientRegistrationError> {
        Ok(self.storage.list_clients(pagination).await?)
    }

    pub async fn count_clients(&self) -> Result<usize, ClientRegistrationError> {
        Ok(self.storage.count_clients().await?)
    }

    /// Replace a stored client.
    ///
    /// An empty `client_secret` keeps the stored hash and takes
    /// `rotated_secrets` from `client` as given. A non-empty secret is hashed
    /// and the stored hash is appended to `client.rotated_secrets`.
    pub async fn update_client(&self, client: &mut OAuthClient) -> Result<(), ClientRegistrationError> {
        let existing = self.get_client(&client.client_id).await?;

        if client.client_secret.is_empty() {
            client.client_secret = existing.client_secret;
        } else {
            client.client_secret = self.hash_secret(&client.client_secret).await?;
            if !existing.client_secret.is_empty() {
                client.rotated_secrets.push(existing.client_secret);
            }
            tracing::info!(client_id = %client.client_id, "client secret rotated");
        }

        client
            .rotated_secrets
            .retain(|hash| !hash.is_empty() && *hash != client.client_secret);
        self.cap_rotated(&mut client.rotated_secrets);

        client.created_at = existing.created_at;
        client.updated_at = Utc::now();

        self.storage
            .update_client(client)
            .await
            .map_err(|e| storage_error(&client.client_id, e))
    }

    pub async fn delete_client(&self, client_id: &str) -> Result<(), ClientRegistrationError> {
        self.storage
            .delete_client(client_id)
            .await
            .map_err(|e| storage_error(client_id, e))?;

        tracing::info!(client_id = %client_id, "client deleted");
        Ok(())
    }

    /// Check `secret` against the active hash, then each rotated hash oldest first.
    pub async fn authenticate(
        &self,
        client_id: &str,
        secret: &str,
    ) -> Result<OAuthClient, ClientRegistrationError> {
        let unauthorized =
            || ClientRegistrationError::Unauthorized("invalid client credentials".to_string());

        let client = match self.storage.get_client(client_id).await? {
            Some(client) => client,
            None => return Err(unauthorized()),
        };
        if secret.is_empty() {
            return Err(unauthorized());
        }

        let candidates = std::iter::once(&client.client_secret).chain(client.rotated_secrets.iter());
        for (generation, hash) in candidates.enumerate() {
            if hash.is_empty() {
                continue;
            }
            if self.hasher.compare(hash, secret).await? {
                if generation > 0 {
                    tracing::debug!(client_id = %client_id, generation, "authenticated with rotated secret");
                }
                return Ok(client);
            }
        }

        Err(unauthorized())
    }

    /// Forget every rotated secret, leaving only the active one valid.
    pub async fn clear_rotated_secrets(
        &self,
        client_id: &str,
    ) -> Result<OAuthClient, ClientRegistrationError> {
        let mut client = self.get_client(client_id).await?;
        client.rotated_secrets.clear();
        client.updated_at = Utc::now();

        self.storage
            .update_client(&client)
            .await
            .map_err(|e| storage_error(client_id, e))?;

        tracing::info!(client_id = %client_id, "rotated client secrets cleared");
        Ok(client)
    }
}

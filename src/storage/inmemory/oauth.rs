//! In-memory client registry storage implementation
//!
//! This module provides in-memory implementations for the registry storage traits.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation for client registry storage
#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: Mutex<HashMap<String, OAuthClient>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|e| StorageError::SerializationFailed(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl OAuthClientStore for MemoryOAuthStorage {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        let mut clients = Self::lock(&self.clients)?;
        if clients.contains_key(&client.client_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Client already exists: {}",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        let clients = Self::lock(&self.clients)?;
        Ok(clients.get(client_id).cloned())
    }

    async fn update_client(&self, client: &OAuthClient) -> Result<()> {
        let mut clients = Self::lock(&self.clients)?;
        match clients.get_mut(&client.client_id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client.client_id
            ))),
        }
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut clients = Self::lock(&self.clients)?;
        clients
            .remove(client_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("Client not found: {}", client_id)))
    }

    async fn list_clients(&self, pagination: Pagination) -> Result<Vec<OAuthClient>> {
        let clients = Self::lock(&self.clients)?;
        let mut result: Vec<_> = clients.values().cloned().collect();
        result.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(result
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit)
            .collect())
    }

    async fn count_clients(&self) -> Result<usize> {
        let clients = Self::lock(&self.clients)?;
        Ok(clients.len())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryOAuthStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let mut tokens = Self::lock(&self.access_tokens)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let tokens = Self::lock(&self.access_tokens)?;
        Ok(tokens.get(token).cloned())
    }
}

impl OAuthStorage for MemoryOAuthStorage {}

//! PostgreSQL storage implementations
//!
//! This module provides PostgreSQL-based implementations of all storage traits.
//! PostgreSQL is suitable for production deployments with high availability requirements.

mod access_tokens;
mod oauth_clients;

use crate::errors::StorageError;
use crate::oauth::types::{AccessToken, OAuthClient, Pagination};
use crate::storage::traits::*;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::sync::Arc;

pub use access_tokens::PostgresAccessTokenStore;
pub use oauth_clients::PostgresOAuthClientStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Comprehensive PostgreSQL client registry storage implementation
pub struct PostgresOAuthStorage {
    pool: PgPool,
    client_store: Arc<PostgresOAuthClientStore>,
    access_token_store: Arc<PostgresAccessTokenStore>,
}

impl PostgresOAuthStorage {
    /// Create a new PostgreSQL storage instance
    pub fn new(pool: PgPool) -> Self {
        let client_store = Arc::new(PostgresOAuthClientStore::new(pool.clone()));
        let access_token_store = Arc::new(PostgresAccessTokenStore::new(pool.clone()));

        Self {
            pool,
            client_store,
            access_token_store,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl OAuthClientStore for PostgresOAuthStorage {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        self.client_store.store_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        self.client_store.get_client(client_id).await
    }

    async fn update_client(&self, client: &OAuthClient) -> Result<()> {
        self.client_store.update_client(client).await
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        self.client_store.delete_client(client_id).await
    }

    async fn list_clients(&self, pagination: Pagination) -> Result<Vec<OAuthClient>> {
        self.client_store.list_clients(pagination).await
    }

    async fn count_clients(&self) -> Result<usize> {
        self.client_store.count_clients().await
    }
}

#[async_trait]
impl AccessTokenStore for PostgresOAuthStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        self.access_token_store.store_token(token).await
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        self.access_token_store.get_token(token).await
    }
}

impl OAuthStorage for PostgresOAuthStorage {}

//! SQLite storage implementations
//!
//! This module provides SQLite-based implementations of all storage traits.
//! SQLite is suitable for single-instance deployments and development.

mod access_tokens;
mod oauth_clients;

use crate::errors::StorageError;
use crate::oauth::types::{AccessToken, OAuthClient, Pagination};
use crate::storage::traits::*;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

pub use access_tokens::SqliteAccessTokenStore;
pub use oauth_clients::SqliteOAuthClientStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Comprehensive SQLite client registry storage implementation
pub struct SqliteOAuthStorage {
    pool: SqlitePool,
    client_store: Arc<SqliteOAuthClientStore>,
    access_token_store: Arc<SqliteAccessTokenStore>,
}

impl SqliteOAuthStorage {
    /// Create a new SQLite storage instance
    pub fn new(pool: SqlitePool) -> Self {
        let client_store = Arc::new(SqliteOAuthClientStore::new(pool.clone()));
        let access_token_store = Arc::new(SqliteAccessTokenStore::new(pool.clone()));

        Self {
            pool,
            client_store,
            access_token_store,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl OAuthClientStore for SqliteOAuthStorage {
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
impl AccessTokenStore for SqliteOAuthStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        self.access_token_store.store_token(token).await
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        self.access_token_store.get_token(token).await
    }
}

impl OAuthStorage for SqliteOAuthStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::ClientRequest;
    use chrono::{Duration, Utc};

    async fn storage() -> SqliteOAuthStorage {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqliteOAuthStorage::new(pool);
        storage.migrate().await.unwrap();
        storage
    }

    fn client(id: &str) -> OAuthClient {
        let mut client = ClientRequest {
            client_name: format!("client {id}"),
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            metadata: Some(serde_json::json!({"tier": "gold"})),
            jwks: Some(serde_json::json!({"keys": []})),
            ..Default::default()
        }
        .into_client(id.to_string(), Utc::now());
        client.client_secret = "$argon2id$hash".to_string();
        client.rotated_secrets = vec!["$argon2id$older".to_string()];
        client
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let storage = storage().await;
        let record = client("alpha");
        storage.store_client(&record).await.unwrap();

        let stored = storage.get_client("alpha").await.unwrap().unwrap();
        assert_eq!(stored.rotated_secrets, record.rotated_secrets);
        assert_eq!(stored.metadata, record.metadata);
        assert_eq!(stored.jwks, record.jwks);
        assert_eq!(stored.redirect_uris, record.redirect_uris);
        assert_eq!(stored.client_secret, record.client_secret);
    }

    #[tokio::test]
    async fn test_conflicts_and_missing() {
        let storage = storage().await;
        storage.store_client(&client("alpha")).await.unwrap();

        let duplicate = storage.store_client(&client("alpha")).await;
        assert!(matches!(duplicate, Err(StorageError::AlreadyExists(_))));

        let missing = storage.update_client(&client("beta")).await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));

        storage.delete_client("alpha").await.unwrap();
        let missing = storage.delete_client("alpha").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let storage = storage().await;
        for id in ["charlie", "alpha", "bravo"] {
            storage.store_client(&client(id)).await.unwrap();
        }

        let page = storage
            .list_clients(Pagination::new(Some(0), Some(2)))
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "bravo"]);
        assert_eq!(storage.count_clients().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let storage = storage().await;
        storage.store_client(&client("alpha")).await.unwrap();

        let page = storage
            .list_clients(Pagination::new(Some(100_000_000_000_000_000), Some(100)))
            .await
            .unwrap();
        assert!(page.is_empty());

        let page = storage
            .list_clients(Pagination {
                page: usize::MAX,
                limit: 1,
            })
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_access_tokens() {
        let storage = storage().await;
        let now = Utc::now();
        let token = AccessToken {
            token: "token-1".to_string(),
            client_id: "alpha".to_string(),
            user_id: Some("user".to_string()),
            scope: Some("openid".to_string()),
            created_at: now,
            expires_at: now + Duration::hours(1),
        };
        storage.store_token(&token).await.unwrap();

        let stored = storage.get_token("token-1").await.unwrap().unwrap();
        assert_eq!(stored.client_id, "alpha");

        assert!(storage.get_token("token-2").await.unwrap().is_none());
    }
}

//! Redis storage implementation
//!
//! Clients are stored as JSON documents under `client:{id}`, with a sorted set
//! indexing client IDs for ordered listing. Access tokens expire through Redis
//! key TTLs.

use crate::errors::StorageError;
use crate::oauth::types::{AccessToken, OAuthClient, Pagination};
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;

pub type Result<T> = std::result::Result<T, StorageError>;

const CLIENT_INDEX_KEY: &str = "clients:index";

/// Redis-backed client registry storage
pub struct RedisOAuthStorage {
    pool: Pool,
    prefix: String,
}

impl RedisOAuthStorage {
    /// Create a pooled Redis storage and verify connectivity
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let pool = PoolConfig::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::ConnectionFailed(format!("Redis pool failed: {}", e)))?;

        let storage = Self {
            pool,
            prefix: "oidc-registry".to_string(),
        };

        let mut conn = storage.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Redis ping failed: {}", e)))?;

        tracing::debug!("Redis connection established");
        Ok(storage)
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Redis pool error: {}", e)))
    }

    fn client_key(&self, client_id: &str) -> String {
        format!("{}:client:{}", self.prefix, client_id)
    }

    fn index_key(&self) -> String {
        format!("{}:{}", self.prefix, CLIENT_INDEX_KEY)
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}:access_token:{}", self.prefix, token)
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
        serde_json::from_str(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }
}

fn query_error(e: redis::RedisError) -> StorageError {
    StorageError::QueryFailed(e.to_string())
}

#[async_trait]
impl OAuthClientStore for RedisOAuthStorage {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        let document = Self::encode(client)?;
        let mut conn = self.connection().await?;

        let created: Option<String> = redis::cmd("SET")
            .arg(self.client_key(&client.client_id))
            .arg(&document)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;

        if created.is_none() {
            return Err(StorageError::AlreadyExists(format!(
                "Client already exists: {}",
                client.client_id
            )));
        }

        let _: i64 = conn
            .zadd(self.index_key(), &client.client_id, 0)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        let mut conn = self.connection().await?;
        let document: Option<String> = conn
            .get(self.client_key(client_id))
            .await
            .map_err(query_error)?;
        document.as_deref().map(Self::decode).transpose()
    }

    async fn update_client(&self, client: &OAuthClient) -> Result<()> {
        let document = Self::encode(client)?;
        let mut conn = self.connection().await?;

        let updated: Option<String> = redis::cmd("SET")
            .arg(self.client_key(&client.client_id))
            .arg(&document)
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;

        match updated {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client.client_id
            ))),
        }
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let (deleted, _): (i64, i64) = redis::pipe()
            .atomic()
            .del(self.client_key(client_id))
            .zrem(self.index_key(), client_id)
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;

        if deleted == 0 {
            return Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client_id
            )));
        }
        Ok(())
    }

    async fn list_clients(&self, pagination: Pagination) -> Result<Vec<OAuthClient>> {
        let mut conn = self.connection().await?;
        let start = isize::try_from(pagination.offset())
            .map_err(|_| StorageError::InvalidData("page offset out of range".to_string()))?;
        let stop = start.saturating_add_unsigned(pagination.limit) - 1;

        let ids: Vec<String> = conn
            .zrange(self.index_key(), start, stop)
            .await
            .map_err(query_error)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.client_key(id)).collect();
        let documents: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(query_error)?;

        documents
            .iter()
            .flatten()
            .map(|document| Self::decode(document))
            .collect()
    }

    async fn count_clients(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        let count: usize = conn.zcard(self.index_key()).await.map_err(query_error)?;
        Ok(count)
    }
}

#[async_trait]
impl AccessTokenStore for RedisOAuthStorage {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        let ttl = (token.expires_at - Utc::now()).num_seconds();
        if ttl <= 0 {
            return Ok(());
        }

        let document = Self::encode(token)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(self.token_key(&token.token), document, ttl as u64)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let mut conn = self.connection().await?;
        let document: Option<String> = conn
            .get(self.token_key(token))
            .await
            .map_err(query_error)?;
        document.as_deref().map(Self::decode).transpose()
    }
}

impl OAuthStorage for RedisOAuthStorage {}

//! PostgreSQL implementation for access token storage

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of access token storage
pub struct PostgresAccessTokenStore {
    pool: PgPool,
}

impl PostgresAccessTokenStore {
    /// Create a new PostgreSQL access token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AccessToken
    fn row_to_access_token(row: &PgRow) -> Result<AccessToken> {
        Ok(AccessToken {
            token: row
                .try_get("token")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get token: {}", e)))?,
            client_id: row.try_get("client_id").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get client_id: {}", e))
            })?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get user_id: {}", e)))?,
            scope: row
                .try_get("scope")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get scope: {}", e)))?,
            created_at: row.try_get("created_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get created_at: {}", e))
            })?,
            expires_at: row.try_get("expires_at").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get expires_at: {}", e))
            })?,
        })
    }
}

#[async_trait]
impl AccessTokenStore for PostgresAccessTokenStore {
    async fn store_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (token, client_id, user_id, scope, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&token.token)
        .bind(&token.client_id)
        .bind(&token.user_id)
        .bind(&token.scope)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }
}

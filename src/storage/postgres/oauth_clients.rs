//! PostgreSQL implementation for OAuth client storage

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{OAuthClientStore, Result};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgRow};

/// PostgreSQL implementation of OAuth client storage
pub struct PostgresOAuthClientStore {
    pool: PgPool,
}

impl PostgresOAuthClientStore {
    /// Create a new PostgreSQL OAuth client store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serialize a string list into a JSONB array
    fn list_to_json(values: &[String]) -> serde_json::Value {
        serde_json::Value::Array(
            values
                .iter()
                .map(|value| serde_json::Value::String(value.clone()))
                .collect(),
        )
    }

    fn rotated_secrets_to_string(rotated_secrets: &[String]) -> Result<String> {
        serde_json::to_string(rotated_secrets)
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        row.try_get(column)
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", column, e)))
    }

    /// Deserialize a JSONB array column into a string list
    fn get_list(row: &PgRow, column: &str) -> Result<Vec<String>> {
        let json: serde_json::Value = Self::get(row, column)?;
        match json {
            serde_json::Value::Array(values) => values
                .into_iter()
                .map(|value| match value {
                    serde_json::Value::String(s) => Ok(s),
                    other => Err(StorageError::InvalidData(format!(
                        "Invalid {} entry: {}",
                        column, other
                    ))),
                })
                .collect(),
            serde_json::Value::Null => Ok(Vec::new()),
            other => Err(StorageError::InvalidData(format!(
                "Invalid {} column: {}",
                column, other
            ))),
        }
    }

    /// Convert PostgreSQL row to OAuthClient
    fn row_to_oauth_client(row: &PgRow) -> Result<OAuthClient> {
        let rotated_secrets: String = Self::get(row, "rotated_secrets")?;
        let rotated_secrets = serde_json::from_str(&rotated_secrets).map_err(|e| {
            StorageError::SerializationFailed(format!("Invalid rotated_secrets column: {}", e))
        })?;

        Ok(OAuthClient {
            client_id: Self::get(row, "client_id")?,
            client_name: Self::get(row, "client_name")?,
            client_secret: Self::get(row, "client_secret")?,
            rotated_secrets,
            redirect_uris: Self::get_list(row, "redirect_uris")?,
            post_logout_redirect_uris: Self::get_list(row, "post_logout_redirect_uris")?,
            grant_types: Self::get_list(row, "grant_types")?,
            response_types: Self::get_list(row, "response_types")?,
            scope: Self::get(row, "scope")?,
            audience: Self::get_list(row, "audience")?,
            owner: Self::get(row, "owner")?,
            client_uri: Self::get(row, "client_uri")?,
            logo_uri: Self::get(row, "logo_uri")?,
            policy_uri: Self::get(row, "policy_uri")?,
            tos_uri: Self::get(row, "tos_uri")?,
            contacts: Self::get_list(row, "contacts")?,
            client_secret_expires_at: Self::get(row, "client_secret_expires_at")?,
            subject_type: Self::get(row, "subject_type")?,
            sector_identifier_uri: Self::get(row, "sector_identifier_uri")?,
            jwks: Self::get(row, "jwks")?,
            jwks_uri: Self::get(row, "jwks_uri")?,
            token_endpoint_auth_method: Self::get(row, "token_endpoint_auth_method")?,
            token_endpoint_auth_signing_alg: Self::get(row, "token_endpoint_auth_signing_alg")?,
            request_uris: Self::get_list(row, "request_uris")?,
            request_object_signing_alg: Self::get(row, "request_object_signing_alg")?,
            userinfo_signed_response_alg: Self::get(row, "userinfo_signed_response_alg")?,
            backchannel_logout_uri: Self::get(row, "backchannel_logout_uri")?,
            backchannel_logout_session_required: Self::get(
                row,
                "backchannel_logout_session_required",
            )?,
            allowed_cors_origins: Self::get_list(row, "allowed_cors_origins")?,
            metadata: Self::get(row, "metadata")?,
            access_token_strategy: Self::get(row, "access_token_strategy")?,
            skip_consent: Self::get(row, "skip_consent")?,
            skip_logout_consent: Self::get(row, "skip_logout_consent")?,
            registration_access_token_signature: Self::get(
                row,
                "registration_access_token_signature",
            )?,
            created_at: Self::get(row, "created_at")?,
            updated_at: Self::get(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl OAuthClientStore for PostgresOAuthClientStore {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        let rotated_secrets = Self::rotated_secrets_to_string(&client.rotated_secrets)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_clients (
                client_id, client_name, client_secret, rotated_secrets, redirect_uris,
                post_logout_redirect_uris, grant_types, response_types, scope, audience,
                owner, client_uri, logo_uri, policy_uri, tos_uri, contacts,
                client_secret_expires_at, subject_type, sector_identifier_uri, jwks, jwks_uri,
                token_endpoint_auth_method, token_endpoint_auth_signing_alg, request_uris,
                request_object_signing_alg, userinfo_signed_response_alg, backchannel_logout_uri,
                backchannel_logout_session_required, allowed_cors_origins, metadata,
                access_token_strategy, skip_consent, skip_logout_consent,
                registration_access_token_signature, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33, $34,
                $35, $36
            )
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.client_name)
        .bind(&client.client_secret)
        .bind(&rotated_secrets)
        .bind(Self::list_to_json(&client.redirect_uris))
        .bind(Self::list_to_json(&client.post_logout_redirect_uris))
        .bind(Self::list_to_json(&client.grant_types))
        .bind(Self::list_to_json(&client.response_types))
        .bind(&client.scope)
        .bind(Self::list_to_json(&client.audience))
        .bind(&client.owner)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(&client.policy_uri)
        .bind(&client.tos_uri)
        .bind(Self::list_to_json(&client.contacts))
        .bind(client.client_secret_expires_at)
        .bind(&client.subject_type)
        .bind(&client.sector_identifier_uri)
        .bind(&client.jwks)
        .bind(&client.jwks_uri)
        .bind(&client.token_endpoint_auth_method)
        .bind(&client.token_endpoint_auth_signing_alg)
        .bind(Self::list_to_json(&client.request_uris))
        .bind(&client.request_object_signing_alg)
        .bind(&client.userinfo_signed_response_alg)
        .bind(&client.backchannel_logout_uri)
        .bind(client.backchannel_logout_session_required)
        .bind(Self::list_to_json(&client.allowed_cors_origins))
        .bind(&client.metadata)
        .bind(&client.access_token_strategy)
        .bind(client.skip_consent)
        .bind(client.skip_logout_consent)
        .bind(&client.registration_access_token_signature)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::AlreadyExists(
                format!("Client already exists: {}", client.client_id),
            ),
            e => StorageError::DatabaseError(e.to_string()),
        })?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_oauth_client).transpose()
    }

    async fn update_client(&self, client: &OAuthClient) -> Result<()> {
        let rotated_secrets = Self::rotated_secrets_to_string(&client.rotated_secrets)?;

        let result = sqlx::query(
            r#"
            UPDATE oauth_clients SET
                client_name = $1, client_secret = $2, rotated_secrets = $3, redirect_uris = $4,
                post_logout_redirect_uris = $5, grant_types = $6, response_types = $7,
                scope = $8, audience = $9, owner = $10, client_uri = $11, logo_uri = $12,
                policy_uri = $13, tos_uri = $14, contacts = $15,
                client_secret_expires_at = $16, subject_type = $17,
                sector_identifier_uri = $18, jwks = $19, jwks_uri = $20,
                token_endpoint_auth_method = $21, token_endpoint_auth_signing_alg = $22,
                request_uris = $23, request_object_signing_alg = $24,
                userinfo_signed_response_alg = $25, backchannel_logout_uri = $26,
                backchannel_logout_session_required = $27, allowed_cors_origins = $28,
                metadata = $29, access_token_strategy = $30, skip_consent = $31,
                skip_logout_consent = $32, registration_access_token_signature = $33,
                updated_at = $34
            WHERE client_id = $35
            "#,
        )
        .bind(&client.client_name)
        .bind(&client.client_secret)
        .bind(&rotated_secrets)
        .bind(Self::list_to_json(&client.redirect_uris))
        .bind(Self::list_to_json(&client.post_logout_redirect_uris))
        .bind(Self::list_to_json(&client.grant_types))
        .bind(Self::list_to_json(&client.response_types))
        .bind(&client.scope)
        .bind(Self::list_to_json(&client.audience))
        .bind(&client.owner)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(&client.policy_uri)
        .bind(&client.tos_uri)
        .bind(Self::list_to_json(&client.contacts))
        .bind(client.client_secret_expires_at)
        .bind(&client.subject_type)
        .bind(&client.sector_identifier_uri)
        .bind(&client.jwks)
        .bind(&client.jwks_uri)
        .bind(&client.token_endpoint_auth_method)
        .bind(&client.token_endpoint_auth_signing_alg)
        .bind(Self::list_to_json(&client.request_uris))
        .bind(&client.request_object_signing_alg)
        .bind(&client.userinfo_signed_response_alg)
        .bind(&client.backchannel_logout_uri)
        .bind(client.backchannel_logout_session_required)
        .bind(Self::list_to_json(&client.allowed_cors_origins))
        .bind(&client.metadata)
        .bind(&client.access_token_strategy)
        .bind(client.skip_consent)
        .bind(client.skip_logout_consent)
        .bind(&client.registration_access_token_signature)
        .bind(client.updated_at)
        .bind(&client.client_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client.client_id
            )));
        }

        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "Client not found: {}",
                client_id
            )));
        }

        Ok(())
    }

    async fn list_clients(&self, pagination: Pagination) -> Result<Vec<OAuthClient>> {
        let offset = i64::try_from(pagination.offset())
            .map_err(|_| StorageError::InvalidData("page offset out of range".to_string()))?;
        let rows =
            sqlx::query("SELECT * FROM oauth_clients ORDER BY client_id LIMIT $1 OFFSET $2")
                .bind(pagination.limit as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_oauth_client).collect()
    }

    async fn count_clients(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM oauth_clients")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(count as usize)
    }
}

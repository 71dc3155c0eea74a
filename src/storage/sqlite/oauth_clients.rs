//! SQLite implementation for OAuth client storage

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::{OAuthClientStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of OAuth client storage
pub struct SqliteOAuthClientStore {
    pool: SqlitePool,
}

/// Column values shared by insert and update statements
struct ClientColumns {
    rotated_secrets: String,
    redirect_uris: String,
    post_logout_redirect_uris: String,
    grant_types: String,
    response_types: String,
    audience: String,
    contacts: String,
    jwks: Option<String>,
    request_uris: String,
    allowed_cors_origins: String,
    metadata: String,
    updated_at: String,
}

impl SqliteOAuthClientStore {
    /// Create a new SQLite OAuth client store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    fn columns(client: &OAuthClient) -> Result<ClientColumns> {
        Ok(ClientColumns {
            rotated_secrets: Self::to_json(&client.rotated_secrets)?,
            redirect_uris: Self::to_json(&client.redirect_uris)?,
            post_logout_redirect_uris: Self::to_json(&client.post_logout_redirect_uris)?,
            grant_types: Self::to_json(&client.grant_types)?,
            response_types: Self::to_json(&client.response_types)?,
            audience: Self::to_json(&client.audience)?,
            contacts: Self::to_json(&client.contacts)?,
            jwks: client.jwks.as_ref().map(Self::to_json).transpose()?,
            request_uris: Self::to_json(&client.request_uris)?,
            allowed_cors_origins: Self::to_json(&client.allowed_cors_origins)?,
            metadata: Self::to_json(&client.metadata)?,
            updated_at: client.updated_at.to_rfc3339(),
        })
    }

    fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(column)
            .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", column, e)))
    }

    fn get_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
        let json: String = Self::get(row, column)?;
        serde_json::from_str(&json).map_err(|e| {
            StorageError::SerializationFailed(format!("Invalid {} column: {}", column, e))
        })
    }

    fn get_timestamp(row: &SqliteRow, column: &str) -> Result<chrono::DateTime<Utc>> {
        let value: String = Self::get(row, column)?;
        chrono::DateTime::parse_from_rfc3339(&value)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", column, e)))
    }

    /// Convert SQLite row to OAuthClient
    fn row_to_oauth_client(row: &SqliteRow) -> Result<OAuthClient> {
        let jwks: Option<String> = Self::get(row, "jwks")?;
        let jwks = jwks
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| StorageError::SerializationFailed(format!("Invalid jwks column: {}", e)))?;

        let metadata: String = Self::get(row, "metadata")?;
        let metadata = serde_json::from_str(&metadata).map_err(|e| {
            StorageError::SerializationFailed(format!("Invalid metadata column: {}", e))
        })?;

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
            jwks,
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
            metadata,
            access_token_strategy: Self::get(row, "access_token_strategy")?,
            skip_consent: Self::get(row, "skip_consent")?,
            skip_logout_consent: Self::get(row, "skip_logout_consent")?,
            registration_access_token_signature: Self::get(
                row,
                "registration_access_token_signature",
            )?,
            created_at: Self::get_timestamp(row, "created_at")?,
            updated_at: Self::get_timestamp(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl OAuthClientStore for SqliteOAuthClientStore {
    async fn store_client(&self, client: &OAuthClient) -> Result<()> {
        let columns = Self::columns(client)?;
        let created_at_str = client.created_at.to_rfc3339();

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
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.client_name)
        .bind(&client.client_secret)
        .bind(&columns.rotated_secrets)
        .bind(&columns.redirect_uris)
        .bind(&columns.post_logout_redirect_uris)
        .bind(&columns.grant_types)
        .bind(&columns.response_types)
        .bind(&client.scope)
        .bind(&columns.audience)
        .bind(&client.owner)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(&client.policy_uri)
        .bind(&client.tos_uri)
        .bind(&columns.contacts)
        .bind(client.client_secret_expires_at)
        .bind(&client.subject_type)
        .bind(&client.sector_identifier_uri)
        .bind(&columns.jwks)
        .bind(&client.jwks_uri)
        .bind(&client.token_endpoint_auth_method)
        .bind(&client.token_endpoint_auth_signing_alg)
        .bind(&columns.request_uris)
        .bind(&client.request_object_signing_alg)
        .bind(&client.userinfo_signed_response_alg)
        .bind(&client.backchannel_logout_uri)
        .bind(client.backchannel_logout_session_required)
        .bind(&columns.allowed_cors_origins)
        .bind(&columns.metadata)
        .bind(&client.access_token_strategy)
        .bind(client.skip_consent)
        .bind(client.skip_logout_consent)
        .bind(&client.registration_access_token_signature)
        .bind(&created_at_str)
        .bind(&columns.updated_at)
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
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_oauth_client).transpose()
    }

    async fn update_client(&self, client: &OAuthClient) -> Result<()> {
        let columns = Self::columns(client)?;

        let result = sqlx::query(
            r#"
            UPDATE oauth_clients SET
                client_name = ?, client_secret = ?, rotated_secrets = ?, redirect_uris = ?,
                post_logout_redirect_uris = ?, grant_types = ?, response_types = ?, scope = ?,
                audience = ?, owner = ?, client_uri = ?, logo_uri = ?, policy_uri = ?,
                tos_uri = ?, contacts = ?, client_secret_expires_at = ?, subject_type = ?,
                sector_identifier_uri = ?, jwks = ?, jwks_uri = ?,
                token_endpoint_auth_method = ?, token_endpoint_auth_signing_alg = ?,
                request_uris = ?, request_object_signing_alg = ?,
                userinfo_signed_response_alg = ?, backchannel_logout_uri = ?,
                backchannel_logout_session_required = ?, allowed_cors_origins = ?,
                metadata = ?, access_token_strategy = ?, skip_consent = ?,
                skip_logout_consent = ?, registration_access_token_signature = ?,
                updated_at = ?
            WHERE client_id = ?
            "#,
        )
        .bind(&client.client_name)
        .bind(&client.client_secret)
        .bind(&columns.rotated_secrets)
        .bind(&columns.redirect_uris)
        .bind(&columns.post_logout_redirect_uris)
        .bind(&columns.grant_types)
        .bind(&columns.response_types)
        .bind(&client.scope)
        .bind(&columns.audience)
        .bind(&client.owner)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(&client.policy_uri)
        .bind(&client.tos_uri)
        .bind(&columns.contacts)
        .bind(client.client_secret_expires_at)
        .bind(&client.subject_type)
        .bind(&client.sector_identifier_uri)
        .bind(&columns.jwks)
        .bind(&client.jwks_uri)
        .bind(&client.token_endpoint_auth_method)
        .bind(&client.token_endpoint_auth_signing_alg)
        .bind(&columns.request_uris)
        .bind(&client.request_object_signing_alg)
        .bind(&client.userinfo_signed_response_alg)
        .bind(&client.backchannel_logout_uri)
        .bind(client.backchannel_logout_session_required)
        .bind(&columns.allowed_cors_origins)
        .bind(&columns.metadata)
        .bind(&client.access_token_strategy)
        .bind(client.skip_consent)
        .bind(client.skip_logout_consent)
        .bind(&client.registration_access_token_signature)
        .bind(&columns.updated_at)
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
        let result = sqlx::query("DELETE FROM oauth_clients WHERE client_id = ?")
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
        let rows = sqlx::query("SELECT * FROM oauth_clients ORDER BY client_id LIMIT ? OFFSET ?")
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

//! Token introspection used to resolve the client behind a bearer token.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::errors::IntrospectionError;
use crate::storage::traits::OAuthStorage;

/// Result of a successful introspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Introspection {
    pub client_id: String,
    pub scope: Option<String>,
}

/// Resolve an access token to the client it was issued to.
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    /// Fails with `Inactive` when the token is unknown, revoked or expired.
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectionError>;
}

/// Introspector backed by the access token store written by the protocol engine.
pub struct StorageTokenIntrospector {
    storage: Arc<dyn OAuthStorage>,
}

impl StorageTokenIntrospector {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TokenIntrospector for StorageTokenIntrospector {
    async fn introspect(&self, token: &str) -> Result<Introspection, IntrospectionError> {
        let access_token = self
            .storage
            .get_token(token)
            .await?
            .ok_or(IntrospectionError::Inactive)?;

        if !access_token.is_active(Utc::now()) {
            return Err(IntrospectionError::Inactive);
        }

        Ok(Introspection {
            client_id: access_token.client_id,
            scope: access_token.scope,
        })
    }
}

//! Storage trait definitions for the client registry.
//!
//! Defines async storage interfaces for client records and the access tokens
//! read during CORS client resolution. Backends implement both.

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving OAuth clients
#[async_trait]
pub trait OAuthClientStore {
    /// Store a new OAuth client; fails with `AlreadyExists` on a duplicate ID
    async fn store_client(&self, client: &OAuthClient) -> Result<()>;

    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>>;

    /// Replace an existing client in a single write; fails with `NotFound`
    async fn update_client(&self, client: &OAuthClient) -> Result<()>;

    /// Delete a client; fails with `NotFound`
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// List one page of clients ordered by client ID
    async fn list_clients(&self, pagination: Pagination) -> Result<Vec<OAuthClient>>;

    /// Total number of registered clients
    async fn count_clients(&self) -> Result<usize>;
}

/// Trait for storing and retrieving access tokens
#[async_trait]
pub trait AccessTokenStore {
    /// Store a new access token
    async fn store_token(&self, token: &AccessToken) -> Result<()>;

    /// Retrieve an access token
    async fn get_token(&self, token: &str) -> Result<Option<AccessToken>>;
}

/// Combined client registry storage trait
pub trait OAuthStorage: OAuthClientStore + AccessTokenStore + Send + Sync {}

//! OAuth 2.0 / OpenID Connect client registry: client records, secret hashing,
//! registration, and CORS origin authorization.

pub mod clients;
pub mod cors;
pub mod introspection;
pub mod registration_token;
pub mod secrets;
pub mod types;

// Re-export frequently used items from each module
pub use crate::storage::{
    inmemory::MemoryOAuthStorage,
    traits::{AccessTokenStore, OAuthClientStore, OAuthStorage},
};
pub use clients::{
    ClientManager, ClientRegistrationService, ClientServiceAuth, ClientValidator, EgressPolicy,
    HttpSectorIdentifierFetcher, SectorIdentifierFetcher,
};
pub use cors::{CorsAuthorizer, CorsDecision, OriginPattern};
pub use introspection::{StorageTokenIntrospector, TokenIntrospector};
pub use registration_token::RegistrationTokenSigner;
pub use secrets::{Argon2SecretHasher, SecretHasher};
pub use types::{
    AccessToken, ClientAuthMethod, ClientRequest, ClientResponse, OAuthClient, Pagination,
};

//! OAuth 2.0 / OpenID Connect client registry.
//!
//! Stores and validates relying-party registrations, manages client secret
//! rotation and serves the administrative and self-service (RFC 7591/7592)
//! registration APIs, including per-client CORS origin authorization.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;

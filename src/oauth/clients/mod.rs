//! OAuth client management and registration.
//!
//! Validates client metadata, stores clients with hashed and rotatable
//! secrets, and serves administrative and self-service (RFC 7591/7592)
//! registration.

pub mod egress;
pub mod manager;
pub mod registration;
pub mod sector_identifier;
pub mod validator;

// Re-export main types and services
pub use egress::EgressPolicy;
pub use manager::ClientManager;
pub use registration::{ClientRegistrationService, ClientServiceAuth, bearer_token};
pub use sector_identifier::{HttpSectorIdentifierFetcher, SectorIdentifierFetcher};
pub use validator::ClientValidator;

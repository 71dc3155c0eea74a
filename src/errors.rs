//! Standardized error types following the `error-registry-<domain>-<number>` format.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-registry-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-registry-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-registry-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-registry-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-registry-config-5 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when a numeric setting cannot be parsed
    #[error("error-registry-config-6 Failed to parse {0} as a number: {1}")]
    NumberParsingFailed(String, std::num::ParseIntError),

    /// Error when a subject type is not one of public or pairwise
    #[error("error-registry-config-7 Unsupported subject type '{0}': expected public or pairwise")]
    UnsupportedSubjectType(String),

    /// Error when a CORS origin pattern is malformed
    #[error("error-registry-config-8 Invalid CORS origin pattern '{0}'")]
    InvalidOriginPattern(String),

    /// Error when the storage backend name is unknown or not compiled in
    #[error("error-registry-config-9 Unsupported storage backend: {0}")]
    UnsupportedStorageBackend(String),
}

/// Client registration errors
#[derive(Debug, Error)]
pub enum ClientRegistrationError {
    /// Invalid client metadata
    #[error("error-registry-client-1 Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Invalid redirect URI
    #[error("error-registry-client-2 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Client not found
    #[error("error-registry-client-3 Client not found: {0}")]
    ClientNotFound(String),

    /// Missing or invalid credentials
    #[error("error-registry-client-4 Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not permitted for the caller's trust domain
    #[error("error-registry-client-5 Forbidden: {0}")]
    Forbidden(String),

    /// Malformed request or a field the trust domain may not set
    #[error("error-registry-client-6 Invalid request: {0}")]
    InvalidRequest(String),

    /// Dynamic client registration disabled
    #[error("error-registry-client-7 Dynamic client registration disabled")]
    RegistrationDisabled,

    /// Secret hashing or comparison failed
    #[error("error-registry-client-8 Secret hashing failed: {0}")]
    SecretHashing(#[from] SecretHashError),

    /// Persistence failure
    #[error("error-registry-client-9 Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl ClientRegistrationError {
    /// Stable OAuth-style error code sent to callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::ClientNotFound(_) => "not_found",
            Self::Unauthorized(_) => "invalid_token",
            Self::Forbidden(_) => "access_denied",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RegistrationDisabled => "not_found",
            Self::Storage(StorageError::AlreadyExists(_)) => "resource_conflict",
            Self::SecretHashing(_) | Self::Storage(_) => "server_error",
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClientMetadata(_)
            | Self::InvalidRedirectUri(_)
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ClientNotFound(_) | Self::RegistrationDisabled => StatusCode::NOT_FOUND,
            Self::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            Self::SecretHashing(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClientRegistrationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let description = if status.is_server_error() {
            tracing::error!(error = ?self, "client registry request failed");
            "The server encountered an internal error".to_string()
        } else {
            tracing::debug!(error = %self, "client registry request rejected");
            self.to_string()
        };

        let mut response = (
            status,
            Json(json!({
                "error": self.error_code(),
                "error_description": description,
            })),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                http::header::WWW_AUTHENTICATE,
                http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Secret hashing errors
#[derive(Debug, Error)]
pub enum SecretHashError {
    /// Hash parameters were rejected
    #[error("error-registry-hash-1 Invalid hash parameters: {0}")]
    InvalidParameters(String),

    /// Hashing the secret failed
    #[error("error-registry-hash-2 Hashing failed: {0}")]
    HashingFailed(String),

    /// A stored hash could not be parsed
    #[error("error-registry-hash-3 Stored hash is malformed: {0}")]
    MalformedHash(String),

    /// The blocking worker running the hash was cancelled or panicked
    #[error("error-registry-hash-4 Hashing task failed: {0}")]
    TaskFailed(String),
}

/// Sector identifier document errors
#[derive(Debug, Error)]
pub enum SectorIdentifierError {
    /// The document could not be fetched
    #[error("error-registry-sector-1 Unable to fetch sector identifier document: {0}")]
    FetchFailed(String),

    /// The remote server answered with a non-success status
    #[error("error-registry-sector-2 Sector identifier document returned status {0}")]
    UnexpectedStatus(u16),

    /// The document exceeded the size limit
    #[error("error-registry-sector-3 Sector identifier document exceeds {0} bytes")]
    TooLarge(usize),

    /// The document is not a JSON array of strings
    #[error("error-registry-sector-4 Sector identifier document is malformed: {0}")]
    Malformed(String),

    /// The outbound HTTP client could not be built
    #[error("error-registry-sector-5 Failed to build sector identifier HTTP client: {0}")]
    ClientBuildFailed(String),
}

/// Token introspection errors
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// Token is unknown, revoked or expired
    #[error("error-registry-introspection-1 Token is not active")]
    Inactive,

    /// Lookup failed
    #[error("error-registry-introspection-2 Token lookup failed: {0}")]
    LookupFailed(#[from] StorageError),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-registry-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-registry-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-registry-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when database operation fails
    #[error("error-registry-storage-4 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-registry-storage-5 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-registry-storage-6 Not found: {0}")]
    NotFound(String),

    /// Error when a record with the same key already exists
    #[error("error-registry-storage-7 Already exists: {0}")]
    AlreadyExists(String),
}

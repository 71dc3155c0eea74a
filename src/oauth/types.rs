//! OAuth 2.0 client registry types and data structures.
//!
//! Defines the persisted client record, the wire shapes used by the registration
//! endpoints, and the access token record read by token introspection.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// OAuth 2.0 Client Authentication Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    PrivateKeyJwt,
    None,
}

impl ClientAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::None => "none",
        }
    }

    /// Whether clients using this method authenticate with a shared secret.
    pub fn uses_secret(&self) -> bool {
        matches!(self, Self::ClientSecretBasic | Self::ClientSecretPost)
    }
}

impl FromStr for ClientAuthMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "client_secret_basic" => Ok(Self::ClientSecretBasic),
            "client_secret_post" => Ok(Self::ClientSecretPost),
            "private_key_jwt" => Ok(Self::PrivateKeyJwt),
            "none" => Ok(Self::None),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered OAuth client as persisted by the storage layer.
///
/// `client_secret` and `rotated_secrets` hold Argon2 PHC hashes once the client
/// has passed through the secret lifecycle manager. Before that, `client_secret`
/// carries the plaintext supplied by (or generated for) the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_name: String,
    pub client_secret: String,
    /// Previous secret hashes, oldest first
    #[serde(default)]
    pub rotated_secrets: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub audience: Vec<String>,
    pub owner: String,
    pub client_uri: String,
    pub logo_uri: String,
    pub policy_uri: String,
    pub tos_uri: String,
    pub contacts: Vec<String>,
    pub client_secret_expires_at: i64,
    pub subject_type: String,
    pub sector_identifier_uri: String,
    pub jwks: Option<serde_json::Value>,
    pub jwks_uri: String,
    pub token_endpoint_auth_method: String,
    pub token_endpoint_auth_signing_alg: String,
    pub request_uris: Vec<String>,
    pub request_object_signing_alg: String,
    pub userinfo_signed_response_alg: String,
    pub backchannel_logout_uri: String,
    pub backchannel_logout_session_required: bool,
    pub allowed_cors_origins: Vec<String>,
    pub metadata: serde_json::Value,
    pub access_token_strategy: String,
    pub skip_consent: bool,
    pub skip_logout_consent: bool,
    pub registration_access_token_signature: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Parsed authentication method; `None` when unset or unknown.
    pub fn auth_method(&self) -> Option<ClientAuthMethod> {
        self.token_endpoint_auth_method.parse().ok()
    }

    /// True when no metadata or an empty JSON object was supplied.
    pub fn metadata_is_empty(&self) -> bool {
        match &self.metadata {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// Client metadata accepted by the create and update endpoints.
///
/// Absent fields take their zero value; the validator fills in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientRequest {
    pub client_id: Option<String>,
    pub client_name: String,
    pub client_secret: Option<String>,
    /// Only accepted from administrators, and only as an empty list
    pub rotated_secrets: Option<Vec<String>>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub audience: Vec<String>,
    pub owner: String,
    pub client_uri: String,
    pub logo_uri: String,
    pub policy_uri: String,
    pub tos_uri: String,
    pub contacts: Vec<String>,
    pub subject_type: String,
    pub sector_identifier_uri: String,
    pub jwks: Option<serde_json::Value>,
    pub jwks_uri: String,
    pub token_endpoint_auth_method: String,
    pub token_endpoint_auth_signing_alg: String,
    pub request_uris: Vec<String>,
    pub request_object_signing_alg: String,
    pub userinfo_signed_response_alg: String,
    pub backchannel_logout_uri: String,
    pub backchannel_logout_session_required: bool,
    pub allowed_cors_origins: Vec<String>,
    pub metadata: Option<serde_json::Value>,
    pub access_token_strategy: String,
    pub skip_consent: bool,
    pub skip_logout_consent: bool,
}

impl ClientRequest {
    /// Build a client record carrying the request's plaintext secret (if any).
    pub fn into_client(self, client_id: String, now: DateTime<Utc>) -> OAuthClient {
        OAuthClient {
            client_id,
            client_name: self.client_name,
            client_secret: self.client_secret.unwrap_or_default(),
            rotated_secrets: self.rotated_secrets.unwrap_or_default(),
            redirect_uris: self.redirect_uris,
            post_logout_redirect_uris: self.post_logout_redirect_uris,
            grant_types: self.grant_types,
            response_types: self.response_types,
            scope: self.scope,
            audience: self.audience,
            owner: self.owner,
            client_uri: self.client_uri,
            logo_uri: self.logo_uri,
            policy_uri: self.policy_uri,
            tos_uri: self.tos_uri,
            contacts: self.contacts,
            client_secret_expires_at: 0,
            subject_type: self.subject_type,
            sector_identifier_uri: self.sector_identifier_uri,
            jwks: self.jwks.filter(|jwks| !jwks.is_null()),
            jwks_uri: self.jwks_uri,
            token_endpoint_auth_method: self.token_endpoint_auth_method,
            token_endpoint_auth_signing_alg: self.token_endpoint_auth_signing_alg,
            request_uris: self.request_uris,
            request_object_signing_alg: self.request_object_signing_alg,
            userinfo_signed_response_alg: self.userinfo_signed_response_alg,
            backchannel_logout_uri: self.backchannel_logout_uri,
            backchannel_logout_session_required: self.backchannel_logout_session_required,
            allowed_cors_origins: self.allowed_cors_origins,
            metadata: match self.metadata {
                None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
                Some(metadata) => metadata,
            },
            access_token_strategy: self.access_token_strategy,
            skip_consent: self.skip_consent,
            skip_logout_consent: self.skip_logout_consent,
            registration_access_token_signature: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client representation returned by the registration endpoints.
///
/// Hashes, rotated secrets and the registration token signature are never
/// part of this shape. The plaintext secret and registration access token are
/// only populated in the response that issued them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResponse {
    pub client_id: String,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_secret_expires_at: i64,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub audience: Vec<String>,
    pub owner: String,
    pub client_uri: String,
    pub logo_uri: String,
    pub policy_uri: String,
    pub tos_uri: String,
    pub contacts: Vec<String>,
    pub subject_type: String,
    pub sector_identifier_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<serde_json::Value>,
    pub jwks_uri: String,
    pub token_endpoint_auth_method: String,
    pub token_endpoint_auth_signing_alg: String,
    pub request_uris: Vec<String>,
    pub request_object_signing_alg: String,
    pub userinfo_signed_response_alg: String,
    pub backchannel_logout_uri: String,
    pub backchannel_logout_session_required: bool,
    pub allowed_cors_origins: Vec<String>,
    pub metadata: serde_json::Value,
    pub access_token_strategy: String,
    pub skip_consent: bool,
    pub skip_logout_consent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_client_uri: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OAuthClient> for ClientResponse {
    fn from(client: &OAuthClient) -> Self {
        Self {
            client_id: client.client_id.clone(),
            client_name: client.client_name.clone(),
            client_secret: None,
            client_secret_expires_at: client.client_secret_expires_at,
            redirect_uris: client.redirect_uris.clone(),
            post_logout_redirect_uris: client.post_logout_redirect_uris.clone(),
            grant_types: client.grant_types.clone(),
            response_types: client.response_types.clone(),
            scope: client.scope.clone(),
            audience: client.audience.clone(),
            owner: client.owner.clone(),
            client_uri: client.client_uri.clone(),
            logo_uri: client.logo_uri.clone(),
            policy_uri: client.policy_uri.clone(),
            tos_uri: client.tos_uri.clone(),
            contacts: client.contacts.clone(),
            subject_type: client.subject_type.clone(),
            sector_identifier_uri: client.sector_identifier_uri.clone(),
            jwks: client.jwks.clone(),
            jwks_uri: client.jwks_uri.clone(),
            token_endpoint_auth_method: client.token_endpoint_auth_method.clone(),
            token_endpoint_auth_signing_alg: client.token_endpoint_auth_signing_alg.clone(),
            request_uris: client.request_uris.clone(),
            request_object_signing_alg: client.request_object_signing_alg.clone(),
            userinfo_signed_response_alg: client.userinfo_signed_response_alg.clone(),
            backchannel_logout_uri: client.backchannel_logout_uri.clone(),
            backchannel_logout_session_required: client.backchannel_logout_session_required,
            allowed_cors_origins: client.allowed_cors_origins.clone(),
            metadata: client.metadata.clone(),
            access_token_strategy: client.access_token_strategy.clone(),
            skip_consent: client.skip_consent,
            skip_logout_consent: client.skip_logout_consent,
            registration_access_token: None,
            registration_client_uri: None,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

/// Page of clients requested by the administrative list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Zero-based page number
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 500;
    /// Largest row offset; `offset + limit` stays representable as `isize` and `i64`
    pub const MAX_OFFSET: usize = isize::MAX as usize - Self::MAX_LIMIT;

    /// Build a page request, clamping the limit to `1..=MAX_LIMIT` and the
    /// page so its offset does not exceed `MAX_OFFSET`.
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        let limit = limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        Self {
            page: page.unwrap_or(0).min(Self::MAX_OFFSET / limit),
            limit,
        }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.limit).min(Self::MAX_OFFSET)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Access token issued by the protocol engine, read for CORS client resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The access token
    pub token: String,
    /// Client ID
    pub client_id: String,
    /// User ID (optional for client credentials)
    pub user_id: Option<String>,
    /// Granted scope
    pub scope: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Generate a secure random token
pub fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

const SECRET_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890_-.~";

/// Generate a client secret of `length` URL-unreserved characters
pub fn generate_secret(length: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())]))
        .collect()
}

/// Generate a client ID
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_method_round_trip() {
        for method in [
            ClientAuthMethod::ClientSecretBasic,
            ClientAuthMethod::ClientSecretPost,
            ClientAuthMethod::PrivateKeyJwt,
            ClientAuthMethod::None,
        ] {
            assert_eq!(method.as_str().parse::<ClientAuthMethod>(), Ok(method));
        }
        assert!("tls_client_auth".parse::<ClientAuthMethod>().is_err());
    }

    #[test]
    fn test_response_omits_secret_material() {
        let mut client = ClientRequest {
            client_secret: Some("plaintext-secret".to_string()),
            ..Default::default()
        }
        .into_client("client-1".to_string(), Utc::now());
        client.rotated_secrets = vec!["$argon2id$old".to_string()];
        client.registration_access_token_signature = "signature".to_string();

        let json = serde_json::to_value(ClientResponse::from(&client)).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("client_secret"));
        assert!(!object.contains_key("rotated_secrets"));
        assert!(!object.contains_key("registration_access_token"));
        assert!(!object.contains_key("registration_access_token_signature"));
        assert!(!json.to_string().contains("plaintext-secret"));
    }

    #[test]
    fn test_request_defaults() {
        let request: ClientRequest = serde_json::from_str(r#"{"client_name":"demo"}"#).unwrap();
        let client = request.into_client("abc".to_string(), Utc::now());
        assert_eq!(client.client_name, "demo");
        assert!(client.client_secret.is_empty());
        assert!(client.metadata_is_empty());
        assert!(client.jwks.is_none());
        assert_eq!(client.client_secret_expires_at, 0);
    }

    #[test]
    fn test_metadata_is_empty() {
        let mut client = ClientRequest::default().into_client("abc".to_string(), Utc::now());
        client.metadata = serde_json::json!({});
        assert!(client.metadata_is_empty());
        client.metadata = serde_json::json!({"tier": "gold"});
        assert!(!client.metadata_is_empty());
    }

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(Pagination::default().limit, 100);
        assert_eq!(Pagination::new(Some(2), Some(1000)).limit, 500);
        assert_eq!(Pagination::new(None, Some(0)).limit, 1);
        assert_eq!(Pagination::new(Some(3), Some(10)).offset(), 30);
    }

    #[test]
    fn test_pagination_offset_fits_signed_integers() {
        let far = Pagination::new(Some(100_000_000_000_000_000), Some(100));
        assert!(far.offset() <= Pagination::MAX_OFFSET);
        assert!(i64::try_from(far.offset() + far.limit).is_ok());
        assert!(isize::try_from(far.offset() + far.limit).is_ok());

        let unchecked = Pagination {
            page: usize::MAX,
            limit: Pagination::MAX_LIMIT,
        };
        assert_eq!(unchecked.offset(), Pagination::MAX_OFFSET);
    }

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret(26);
        assert_eq!(secret.len(), 26);
        assert!(secret.bytes().all(|c| SECRET_ALPHABET.contains(&c)));
        assert_ne!(generate_token(), generate_token());
    }
}

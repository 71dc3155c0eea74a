//! Client metadata validation and normalization.
//!
//! Rules run in a fixed order and the first violation is returned. Besides
//! rejecting invalid metadata the validator fills in defaults (auth method,
//! scope, subject type, userinfo signing algorithm) and canonicalizes CORS
//! origins on the working copy it is given.

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::JwkSet;
use std::sync::Arc;
use url::Url;

use super::egress::EgressPolicy;
use super::sector_identifier::SectorIdentifierFetcher;
use crate::errors::ClientRegistrationError;
use crate::oauth::cors::canonicalize_origin;
use crate::oauth::types::{ClientAuthMethod, OAuthClient};

/// Shortest accepted client secret
pub const MIN_SECRET_LENGTH: usize = 6;

const SUPPORTED_SIGNING_ALGS: &[&str] = &[
    "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256", "ES384", "ES512",
];

const ACCESS_TOKEN_STRATEGIES: &[&str] = &["opaque", "jwt"];

/// Validator configured with the server's policy
pub struct ClientValidator {
    default_client_scopes: String,
    subject_types_supported: Vec<String>,
    egress: EgressPolicy,
    sector_fetcher: Arc<dyn SectorIdentifierFetcher>,
}

fn invalid(message: impl Into<String>) -> ClientRegistrationError {
    ClientRegistrationError::InvalidClientMetadata(message.into())
}

impl ClientValidator {
    pub fn new(
        default_client_scopes: impl Into<String>,
        subject_types_supported: Vec<String>,
        egress: EgressPolicy,
        sector_fetcher: Arc<dyn SectorIdentifierFetcher>,
    ) -> Self {
        Self {
            default_client_scopes: default_client_scopes.into(),
            subject_types_supported,
            egress,
            sector_fetcher,
        }
    }

    /// Validate and normalize `client` in place.
    ///
    /// `client.client_secret` is expected to hold the plaintext secret, or be
    /// empty when none was supplied.
    pub async fn validate(&self, client: &mut OAuthClient) -> Result<(), ClientRegistrationError> {
        if client.token_endpoint_auth_method.is_empty() {
            client.token_endpoint_auth_method = ClientAuthMethod::ClientSecretBasic.to_string();
        }
        let auth_method = client.auth_method().ok_or_else(|| {
            invalid(format!(
                "Field token_endpoint_auth_method contains unknown method '{}'",
                client.token_endpoint_auth_method
            ))
        })?;

        if auth_method == ClientAuthMethod::PrivateKeyJwt {
            if client.jwks_uri.is_empty() && client.jwks.is_none() {
                return Err(invalid(
                    "When token_endpoint_auth_method is private_key_jwt, either jwks or jwks_uri must be set",
                ));
            }
            if !client.token_endpoint_auth_signing_alg.is_empty()
                && !SUPPORTED_SIGNING_ALGS.contains(&client.token_endpoint_auth_signing_alg.as_str())
            {
                return Err(invalid(format!(
                    "Field token_endpoint_auth_signing_alg must be one of {}",
                    SUPPORTED_SIGNING_ALGS.join(", ")
                )));
            }
        }

        if !client.jwks_uri.is_empty() && client.jwks.is_some() {
            return Err(invalid("Fields jwks and jwks_uri are mutually exclusive"));
        }

        if let Some(jwks) = &client.jwks {
            validate_jwks(jwks)?;
        }

        if self.egress.is_restricted() {
            self.check_egress(client).await?;
        }

        if !client.client_secret.is_empty() && client.client_secret.len() < MIN_SECRET_LENGTH {
            return Err(invalid(format!(
                "Field client_secret must contain at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }

        if client.scope.trim().is_empty() {
            client.scope = self.default_client_scopes.clone();
        }

        client.allowed_cors_origins = client
            .allowed_cors_origins
            .iter()
            .map(|origin| {
                canonicalize_origin(origin).ok_or_else(|| {
                    invalid(format!(
                        "Origin '{}' in allowed_cors_origins must be an http or https origin without userinfo, path, query or fragment",
                        origin
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        client.client_secret_expires_at = 0;

        if !client.sector_identifier_uri.is_empty() {
            self.check_sector_identifier(client).await?;
        }

        if client.userinfo_signed_response_alg.is_empty() {
            client.userinfo_signed_response_alg = "none".to_string();
        }
        if client.userinfo_signed_response_alg != "none"
            && client.userinfo_signed_response_alg != "RS256"
        {
            return Err(invalid(
                "Field userinfo_signed_response_alg can either be \"none\" or \"RS256\"",
            ));
        }

        let redirect_uris = client
            .redirect_uris
            .iter()
            .map(|uri| parse_redirect_uri(uri))
            .collect::<Result<Vec<_>, _>>()?;

        if client.subject_type.is_empty() {
            client.subject_type = if self.subject_types_supported.iter().any(|t| t == "public") {
                "public".to_string()
            } else {
                self.subject_types_supported
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "public".to_string())
            };
        } else if !self.subject_types_supported.contains(&client.subject_type) {
            return Err(invalid(format!(
                "Subject type '{}' is not supported by the server, expected one of {}",
                client.subject_type,
                self.subject_types_supported.join(", ")
            )));
        }

        for uri in &client.post_logout_redirect_uris {
            let post_logout = Url::parse(uri).map_err(|_| {
                invalid(format!(
                    "post_logout_redirect_uri '{}' must be an absolute URI",
                    uri
                ))
            })?;
            let shares_origin = redirect_uris.iter().any(|redirect| {
                redirect.scheme() == post_logout.scheme()
                    && redirect.host_str() == post_logout.host_str()
                    && redirect.port_or_known_default() == post_logout.port_or_known_default()
            });
            if !shares_origin {
                return Err(invalid(format!(
                    "post_logout_redirect_uri '{}' must match the scheme, host and port of a redirect_uri",
                    uri
                )));
            }
        }

        if !client.access_token_strategy.is_empty() {
            let strategy = client.access_token_strategy.to_ascii_lowercase();
            if !ACCESS_TOKEN_STRATEGIES.contains(&strategy.as_str()) {
                return Err(invalid(
                    "Field access_token_strategy must be one of \"opaque\" or \"jwt\"",
                ));
            }
            client.access_token_strategy = strategy;
        }

        Ok(())
    }

    /// Validate a record submitted through self-service registration.
    ///
    /// Administrator-only fields are refused before the common rules run.
    pub async fn validate_dynamic_registration(
        &self,
        client: &mut OAuthClient,
    ) -> Result<(), ClientRegistrationError> {
        if !client.metadata_is_empty() {
            return Err(invalid(
                "metadata cannot be set for dynamic client registration",
            ));
        }
        if !client.access_token_strategy.is_empty() {
            return Err(ClientRegistrationError::InvalidRequest(
                "access_token_strategy cannot be set for dynamic client registration".to_string(),
            ));
        }
        if client.skip_consent {
            return Err(ClientRegistrationError::InvalidRequest(
                "skip_consent cannot be set for dynamic client registration".to_string(),
            ));
        }
        if client.skip_logout_consent {
            return Err(ClientRegistrationError::InvalidRequest(
                "skip_logout_consent cannot be set for dynamic client registration".to_string(),
            ));
        }

        self.validate(client).await
    }

    async fn check_egress(&self, client: &OAuthClient) -> Result<(), ClientRegistrationError> {
        let mut uris: Vec<(&str, &str)> = Vec::new();
        if !client.jwks_uri.is_empty() {
            uris.push(("jwks_uri", client.jwks_uri.as_str()));
        }
        if !client.backchannel_logout_uri.is_empty() {
            uris.push(("backchannel_logout_uri", client.backchannel_logout_uri.as_str()));
        }
        for uri in &client.request_uris {
            uris.push(("request_uris", uri.as_str()));
        }

        for (field, uri) in uris {
            self.egress
                .check_uri(uri)
                .await
                .map_err(|reason| invalid(format!("Field {} is not allowed: {}", field, reason)))?;
        }
        Ok(())
    }

    async fn check_sector_identifier(
        &self,
        client: &OAuthClient,
    ) -> Result<(), ClientRegistrationError> {
        let generic = || {
            invalid(
                "Value of sector_identifier_uri could not be validated; it must be an https URI serving a JSON array that contains every redirect_uri",
            )
        };

        let uri = Url::parse(&client.sector_identifier_uri).map_err(|e| {
            tracing::debug!(error = %e, "sector_identifier_uri is not a URI");
            generic()
        })?;
        if uri.scheme() != "https" {
            tracing::debug!(scheme = uri.scheme(), "sector_identifier_uri is not https");
            return Err(generic());
        }

        let allowed = self
            .sector_fetcher
            .fetch(uri.as_str())
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "sector identifier document rejected");
                generic()
            })?;

        if let Some(missing) = client
            .redirect_uris
            .iter()
            .find(|redirect| !allowed.contains(redirect))
        {
            tracing::debug!(redirect_uri = %missing, "redirect_uri missing from sector identifier document");
            return Err(generic());
        }
        Ok(())
    }
}

fn validate_jwks(jwks: &serde_json::Value) -> Result<(), ClientRegistrationError> {
    let set: JwkSet = serde_json::from_value(jwks.clone())
        .map_err(|e| invalid(format!("Field jwks is not a valid JSON Web Key Set: {}", e)))?;
    for (index, jwk) in set.keys.iter().enumerate() {
        DecodingKey::from_jwk(jwk)
            .map_err(|e| invalid(format!("Key {} in jwks is invalid: {}", index, e)))?;
    }
    Ok(())
}

fn parse_redirect_uri(uri: &str) -> Result<Url, ClientRegistrationError> {
    let parsed = Url::parse(uri).map_err(|_| {
        ClientRegistrationError::InvalidRedirectUri(format!(
            "Redirect URI '{}' must be an absolute URI",
            uri
        ))
    })?;
    if parsed.fragment().is_some() || uri.contains('#') {
        return Err(ClientRegistrationError::InvalidRedirectUri(format!(
            "Redirect URI '{}' must not contain fragments (#)",
            uri
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::SectorIdentifierError;
    use crate::oauth::types::ClientRequest;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    /// Sector fetcher returning a fixed document
    pub(crate) struct StaticSectorFetcher(pub Vec<String>);

    #[async_trait]
    impl SectorIdentifierFetcher for StaticSectorFetcher {
        async fn fetch(&self, _uri: &str) -> Result<Vec<String>, SectorIdentifierError> {
            if self.0.is_empty() {
                return Err(SectorIdentifierError::Malformed("empty".to_string()));
            }
            Ok(self.0.clone())
        }
    }

    pub(crate) fn validator_with(
        subject_types: &[&str],
        disallow_private: bool,
        sector: &[&str],
    ) -> ClientValidator {
        ClientValidator::new(
            "offline_access offline openid",
            subject_types.iter().map(|s| s.to_string()).collect(),
            EgressPolicy::new(disallow_private),
            Arc::new(StaticSectorFetcher(
                sector.iter().map(|s| s.to_string()).collect(),
            )),
        )
    }

    pub(crate) fn validator() -> ClientValidator {
        validator_with(&["public"], false, &[])
    }

    fn client(request: ClientRequest) -> OAuthClient {
        request.into_client("client-1".to_string(), Utc::now())
    }

    fn rsa_jwks() -> serde_json::Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "kid": "key-1",
                "use": "sig",
                "alg": "RS256",
                "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                "e": "AQAB"
            }]
        })
    }

    fn assert_metadata_error(result: Result<(), ClientRegistrationError>) {
        assert!(
            matches!(result, Err(ClientRegistrationError::InvalidClientMetadata(_))),
            "expected invalid_client_metadata, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let mut c = client(ClientRequest {
            redirect_uris: vec!["https://app.example.com/cb".to_string()],
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();

        assert_eq!(c.token_endpoint_auth_method, "client_secret_basic");
        assert_eq!(c.scope, "offline_access offline openid");
        assert_eq!(c.subject_type, "public");
        assert_eq!(c.userinfo_signed_response_alg, "none");
        assert_eq!(c.client_secret_expires_at, 0);
    }

    #[tokio::test]
    async fn test_unknown_auth_method() {
        let mut c = client(ClientRequest {
            token_endpoint_auth_method: "tls_client_auth".to_string(),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_private_key_jwt_requirements() {
        let mut c = client(ClientRequest {
            token_endpoint_auth_method: "private_key_jwt".to_string(),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);

        let mut c = client(ClientRequest {
            token_endpoint_auth_method: "private_key_jwt".to_string(),
            jwks_uri: "https://app.example.com/jwks.json".to_string(),
            token_endpoint_auth_signing_alg: "HS256".to_string(),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);

        let mut c = client(ClientRequest {
            token_endpoint_auth_method: "private_key_jwt".to_string(),
            jwks: Some(rsa_jwks()),
            token_endpoint_auth_signing_alg: "PS384".to_string(),
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();
    }

    #[tokio::test]
    async fn test_jwks_and_jwks_uri_mutually_exclusive() {
        for method in ["client_secret_basic", "private_key_jwt", "none"] {
            let mut c = client(ClientRequest {
                token_endpoint_auth_method: method.to_string(),
                jwks: Some(rsa_jwks()),
                jwks_uri: "https://app.example.com/jwks.json".to_string(),
                ..Default::default()
            });
            assert_metadata_error(validator().validate(&mut c).await);
        }
    }

    #[tokio::test]
    async fn test_invalid_jwks() {
        let mut c = client(ClientRequest {
            jwks: Some(json!({"keys": [{"kty": "RSA", "e": "AQAB"}]})),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);

        let mut c = client(ClientRequest {
            jwks: Some(json!({"keys": [{"kty": "RSA", "n": "***", "e": "AQAB"}]})),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);

        let mut c = client(ClientRequest {
            jwks: Some(json!(["not", "a", "set"])),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_private_egress() {
        let v = validator_with(&["public"], true, &[]);

        let mut c = client(ClientRequest {
            jwks_uri: "http://127.0.0.1/jwks.json".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);

        let mut c = client(ClientRequest {
            backchannel_logout_uri: "http://10.0.0.5/logout".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);

        let mut c = client(ClientRequest {
            request_uris: vec![
                "https://8.8.8.8/request".to_string(),
                "http://192.168.1.1/request".to_string(),
            ],
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);

        let mut c = client(ClientRequest {
            jwks_uri: "http://127.0.0.1/jwks.json".to_string(),
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();
    }

    #[tokio::test]
    async fn test_secret_length() {
        let mut c = client(ClientRequest {
            client_secret: Some("short".to_string()),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);

        let mut c = client(ClientRequest {
            client_secret: Some("long-enough".to_string()),
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();
    }

    #[tokio::test]
    async fn test_cors_origins_canonicalized() {
        let mut c = client(ClientRequest {
            allowed_cors_origins: vec![
                "https://App.Example.com/".to_string(),
                "http://localhost:3000".to_string(),
            ],
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();
        assert_eq!(
            c.allowed_cors_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );

        for origin in [
            "https://example.com/path",
            "https://user@example.com",
            "ftp://example.com",
            "https://example.com?x=1",
        ] {
            let mut c = client(ClientRequest {
                allowed_cors_origins: vec![origin.to_string()],
                ..Default::default()
            });
            assert_metadata_error(validator().validate(&mut c).await);
        }
    }

    #[tokio::test]
    async fn test_sector_identifier() {
        let redirect = "http://localhost:3000/cb";

        let v = validator_with(&["public", "pairwise"], false, &["http://foo"]);
        let mut c = client(ClientRequest {
            redirect_uris: vec![redirect.to_string()],
            sector_identifier_uri: "https://sector.example.com/uris.json".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);

        let v = validator_with(&["public", "pairwise"], false, &["http://foo", redirect]);
        let mut c = client(ClientRequest {
            redirect_uris: vec![redirect.to_string()],
            sector_identifier_uri: "https://sector.example.com/uris.json".to_string(),
            ..Default::default()
        });
        v.validate(&mut c).await.unwrap();

        let mut c = client(ClientRequest {
            redirect_uris: vec![redirect.to_string()],
            sector_identifier_uri: "http://sector.example.com/uris.json".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);

        let v = validator_with(&["public"], false, &[]);
        let mut c = client(ClientRequest {
            redirect_uris: vec![redirect.to_string()],
            sector_identifier_uri: "https://sector.example.com/uris.json".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_userinfo_signing_alg() {
        let mut c = client(ClientRequest {
            userinfo_signed_response_alg: "RS256".to_string(),
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();

        let mut c = client(ClientRequest {
            userinfo_signed_response_alg: "ES256".to_string(),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_redirect_uris() {
        let mut c = client(ClientRequest {
            redirect_uris: vec!["https://app.example.com/cb#section".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            validator().validate(&mut c).await,
            Err(ClientRegistrationError::InvalidRedirectUri(_))
        ));

        let mut c = client(ClientRequest {
            redirect_uris: vec!["/relative/cb".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            validator().validate(&mut c).await,
            Err(ClientRegistrationError::InvalidRedirectUri(_))
        ));
    }

    #[tokio::test]
    async fn test_subject_types() {
        let v = validator_with(&["pairwise"], false, &[]);
        let mut c = client(ClientRequest::default());
        v.validate(&mut c).await.unwrap();
        assert_eq!(c.subject_type, "pairwise");

        let mut c = client(ClientRequest {
            subject_type: "public".to_string(),
            ..Default::default()
        });
        assert_metadata_error(v.validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_post_logout_redirect_uris() {
        let mut c = client(ClientRequest {
            redirect_uris: vec!["https://app.example.com/cb".to_string()],
            post_logout_redirect_uris: vec!["https://app.example.com/logged-out".to_string()],
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();

        for uri in [
            "https://other.example.com/logged-out",
            "http://app.example.com/logged-out",
            "https://app.example.com:8443/logged-out",
            "logged-out",
        ] {
            let mut c = client(ClientRequest {
                redirect_uris: vec!["https://app.example.com/cb".to_string()],
                post_logout_redirect_uris: vec![uri.to_string()],
                ..Default::default()
            });
            assert_metadata_error(validator().validate(&mut c).await);
        }
    }

    #[tokio::test]
    async fn test_access_token_strategy() {
        let mut c = client(ClientRequest {
            access_token_strategy: "JWT".to_string(),
            ..Default::default()
        });
        validator().validate(&mut c).await.unwrap();
        assert_eq!(c.access_token_strategy, "jwt");

        let mut c = client(ClientRequest {
            access_token_strategy: "macaroon".to_string(),
            ..Default::default()
        });
        assert_metadata_error(validator().validate(&mut c).await);
    }

    #[tokio::test]
    async fn test_dynamic_registration_restrictions() {
        let mut c = client(ClientRequest {
            metadata: Some(json!({"tier": "gold"})),
            ..Default::default()
        });
        assert_metadata_error(validator().validate_dynamic_registration(&mut c).await);

        let mut c = client(ClientRequest {
            access_token_strategy: "jwt".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            validator().validate_dynamic_registration(&mut c).await,
            Err(ClientRegistrationError::InvalidRequest(_))
        ));

        let mut c = client(ClientRequest {
            skip_consent: true,
            ..Default::default()
        });
        assert!(matches!(
            validator().validate_dynamic_registration(&mut c).await,
            Err(ClientRegistrationError::InvalidRequest(_))
        ));

        let mut c = client(ClientRequest {
            skip_logout_consent: true,
            ..Default::default()
        });
        assert!(matches!(
            validator().validate_dynamic_registration(&mut c).await,
            Err(ClientRegistrationError::InvalidRequest(_))
        ));

        let mut c = client(ClientRequest {
            redirect_uris: vec!["https://app.example.com/cb".to_string()],
            ..Default::default()
        });
        validator().validate_dynamic_registration(&mut c).await.unwrap();
    }
}

//! Client registration for the administrative and self-service trust domains.
//!
//! Administrators may set every field. Self-service callers (RFC 7591/7592)
//! register without credentials and prove ownership afterwards with the
//! registration access token issued at creation time. Each successful
//! self-service update replaces that token.

use chrono::Utc;
use http::HeaderMap;

use super::manager::ClientManager;
use super::validator::ClientValidator;
use crate::errors::ClientRegistrationError;
use crate::oauth::registration_token::RegistrationTokenSigner;
use crate::oauth::types::*;

/// Length of generated client secrets
pub const GENERATED_SECRET_LENGTH: usize = 26;

/// Client Registration Service
pub struct ClientRegistrationService {
    manager: ClientManager,
    validator: ClientValidator,
    token_signer: RegistrationTokenSigner,
    /// Public base URL used to build `registration_client_uri`
    external_base: String,
    /// Whether self-service registration is enabled
    registration_enabled: bool,
}

/// Trust domain a request is acting in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientServiceAuth {
    Administrator,
    RegistrationToken(String),
}

impl ClientServiceAuth {
    /// Self-service credentials from the request's bearer token.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ClientRegistrationError> {
        bearer_token(headers)
            .map(|token| Self::RegistrationToken(token.to_string()))
            .ok_or_else(|| {
                ClientRegistrationError::Unauthorized(
                    "missing registration access token".to_string(),
                )
            })
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Self::RegistrationToken(_))
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl ClientRegistrationService {
    /// Create a new client registration service
    pub fn new(
        manager: ClientManager,
        validator: ClientValidator,
        token_signer: RegistrationTokenSigner,
        external_base: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            validator,
            token_signer,
            external_base: external_base.into(),
            registration_enabled: true,
        }
    }

    /// Disable self-service registration
    pub fn disable_registration(mut self) -> Self {
        self.registration_enabled = false;
        self
    }

    pub fn registration_enabled(&self) -> bool {
        self.registration_enabled
    }

    pub fn manager(&self) -> &ClientManager {
        &self.manager
    }

    fn registration_client_uri(&self, client_id: &str) -> String {
        format!(
            "{}/oauth2/register/{}",
            self.external_base.trim_end_matches('/'),
            client_id
        )
    }

    /// Register a new client.
    ///
    /// The response is the only place the plaintext secret and, for
    /// self-service registrations, the registration access token appear.
    pub async fn create_client(
        &self,
        request: ClientRequest,
        dynamic: bool,
    ) -> Result<ClientResponse, ClientRegistrationError> {
        if dynamic && !self.registration_enabled {
            return Err(ClientRegistrationError::RegistrationDisabled);
        }

        match (&request.rotated_secrets, dynamic) {
            (Some(_), true) => {
                return Err(ClientRegistrationError::Forbidden(
                    "rotated_secrets cannot be set for dynamic client registration".to_string(),
                ));
            }
            (Some(rotated), false) if !rotated.is_empty() => {
                return Err(ClientRegistrationError::InvalidRequest(
                    "rotated_secrets can only be cleared".to_string(),
                ));
            }
            _ => {}
        }

        let client_id = request
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_client_id);
        let mut client = request.into_client(client_id, Utc::now());

        if dynamic {
            self.validator.validate_dynamic_registration(&mut client).await?;
        } else {
            self.validator.validate(&mut client).await?;
        }

        if client.client_secret.is_empty()
            && client.auth_method().is_some_and(|method| method.uses_secret())
        {
            client.client_secret = generate_secret(GENERATED_SECRET_LENGTH);
        }
        let plaintext_secret = client.client_secret.clone();

        let registration_token = dynamic.then(|| self.token_signer.issue());
        if let Some(issued) = &registration_token {
            client.registration_access_token_signature = issued.signature.clone();
        }

        self.manager.create_client(&mut client).await?;

        let mut response = ClientResponse::from(&client);
        response.client_secret = (!plaintext_secret.is_empty()).then_some(plaintext_secret);
        if let Some(issued) = registration_token {
            response.registration_access_token = Some(issued.token);
            response.registration_client_uri = Some(self.registration_client_uri(&client.client_id));
        }
        Ok(response)
    }

    /// Load the client and check the caller may act on it.
    async fn authorize(
        &self,
        client_id: &str,
        auth: &ClientServiceAuth,
    ) -> Result<OAuthClient, ClientRegistrationError> {
        match auth {
            ClientServiceAuth::Administrator => self.manager.get_client(client_id).await,
            ClientServiceAuth::RegistrationToken(token) => {
                if !self.registration_enabled {
                    return Err(ClientRegistrationError::RegistrationDisabled);
                }
                let client = match self.manager.get_client(client_id).await {
                    Ok(client) => client,
                    Err(ClientRegistrationError::ClientNotFound(_)) => {
                        return Err(ClientRegistrationError::Unauthorized(
                            "registration access token is not valid for this client".to_string(),
                        ));
                    }
                    Err(e) => return Err(e),
                };
                if !self
                    .token_signer
                    .verify(token, &client.registration_access_token_signature)
                {
                    tracing::debug!(client_id, "registration access token rejected");
                    return Err(ClientRegistrationError::Unauthorized(
                        "registration access token is not valid for this client".to_string(),
                    ));
                }
                Ok(client)
            }
        }
    }

    /// Authenticate a self-service request against the client named in the path.
    pub async fn valid_dynamic_auth(
        &self,
        headers: &HeaderMap,
        client_id: &str,
    ) -> Result<OAuthClient, ClientRegistrationError> {
        let auth = ClientServiceAuth::from_headers(headers)?;
        self.authorize(client_id, &auth).await
    }

    /// Get client configuration
    pub async fn get_client(
        &self,
        client_id: &str,
        auth: &ClientServiceAuth,
    ) -> Result<ClientResponse, ClientRegistrationError> {
        let client = self.authorize(client_id, auth).await?;
        let mut response = ClientResponse::from(&client);
        if auth.is_dynamic() {
            response.registration_client_uri = Some(self.registration_client_uri(client_id));
        }
        Ok(response)
    }

    /// One page of clients and the total number of clients
    pub async fn list_clients(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<ClientResponse>, usize), ClientRegistrationError> {
        let clients = self.manager.get_clients(pagination).await?;
        let total = self.manager.count_clients().await?;
        Ok((clients.iter().map(ClientResponse::from).collect(), total))
    }

    /// Replace a client's configuration.
    ///
    /// Administrators may rotate the secret by supplying a new one and clear
    /// rotated secrets with `"rotated_secrets": []`. Self-service callers may
    /// change neither, and cannot alter administrator-only fields.
    pub async fn update_client(
        &self,
        client_id: &str,
        auth: &ClientServiceAuth,
        request: ClientRequest,
    ) -> Result<ClientResponse, ClientRegistrationError> {
        let existing = self.authorize(client_id, auth).await?;
        let dynamic = auth.is_dynamic();

        if request
            .client_id
            .as_deref()
            .is_some_and(|id| !id.is_empty() && id != client_id)
        {
            return Err(ClientRegistrationError::InvalidRequest(
                "client_id cannot be changed".to_string(),
            ));
        }

        if dynamic {
            if request.client_secret.as_deref().is_some_and(|s| !s.is_empty()) {
                return Err(ClientRegistrationError::Forbidden(
                    "client_secret can only be changed by an administrator".to_string(),
                ));
            }
            if request.rotated_secrets.is_some() {
                return Err(ClientRegistrationError::Forbidden(
                    "rotated_secrets can only be changed by an administrator".to_string(),
                ));
            }
        }

        let rotated_secrets = match &request.rotated_secrets {
            None => existing.rotated_secrets.clone(),
            Some(rotated) if rotated.is_empty() => Vec::new(),
            Some(_) => {
                return Err(ClientRegistrationError::InvalidRequest(
                    "rotated_secrets can only be cleared".to_string(),
                ));
            }
        };

        let mut client = request.into_client(client_id.to_string(), existing.created_at);
        client.rotated_secrets = rotated_secrets;

        if dynamic {
            self.validator.validate_dynamic_registration(&mut client).await?;
            client.metadata = existing.metadata.clone();
            client.access_token_strategy = existing.access_token_strategy.clone();
            client.skip_consent = existing.skip_consent;
            client.skip_logout_consent = existing.skip_logout_consent;
        } else {
            self.validator.validate(&mut client).await?;
        }
        let plaintext_secret = client.client_secret.clone();

        let registration_token = dynamic.then(|| self.token_signer.issue());
        client.registration_access_token_signature = match &registration_token {
            Some(issued) => issued.signature.clone(),
            None => existing.registration_access_token_signature.clone(),
        };

        self.manager.update_client(&mut client).await?;

        let mut response = ClientResponse::from(&client);
        response.client_secret = (!plaintext_secret.is_empty()).then_some(plaintext_secret);
        if let Some(issued) = registration_token {
            response.registration_access_token = Some(issued.token);
            response.registration_client_uri = Some(self.registration_client_uri(client_id));
        }
        Ok(response)
    }

    /// Delete client registration
    pub async fn delete_client(
        &self,
        client_id: &str,
        auth: &ClientServiceAuth,
    ) -> Result<(), ClientRegistrationError> {
        self.authorize(client_id, auth).await?;
        self.manager.delete_client(client_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::clients::validator::tests::validator;
    use crate::oauth::secrets::test_hasher;
    use crate::storage::MemoryOAuthStorage;
    use http::HeaderValue;
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> ClientRegistrationService {
        let manager = ClientManager::new(
            Arc::new(MemoryOAuthStorage::new()),
            Arc::new(test_hasher()),
            None,
        );
        ClientRegistrationService::new(
            manager,
            validator(),
            RegistrationTokenSigner::new("test-registration-secret"),
            "https://auth.example.com/",
        )
    }

    fn request() -> ClientRequest {
        ClientRequest {
            client_name: "Test Client".to_string(),
            redirect_uris: vec!["https://app.example.com/callback".to_string()],
            ..Default::default()
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&bearer("abc")), Some("abc"));

        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("bearer  xyz "),
        );
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic Zm9vOmJhcg=="),
        );
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_client_registration() {
        let service = service();
        let response = service.create_client(request(), true).await.unwrap();

        assert!(!response.client_id.is_empty());
        let secret = response.client_secret.clone().unwrap();
        assert_eq!(secret.len(), GENERATED_SECRET_LENGTH);
        assert!(response.registration_access_token.is_some());
        assert_eq!(
            response.registration_client_uri.as_deref(),
            Some(format!("https://auth.example.com/oauth2/register/{}", response.client_id).as_str())
        );
        assert!(
            service
                .manager()
                .authenticate(&response.client_id, &secret)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_admin_create_keeps_supplied_id_and_secret() {
        let service = service();
        let response = service
            .create_client(
                ClientRequest {
                    client_id: Some("admin-client".to_string()),
                    client_secret: Some("supplied-secret".to_string()),
                    metadata: Some(json!({"team": "payments"})),
                    ..request()
                },
                false,
            )
            .await
            .unwrap();

        assert_eq!(response.client_id, "admin-client");
        assert_eq!(response.client_secret.as_deref(), Some("supplied-secret"));
        assert_eq!(response.metadata, json!({"team": "payments"}));
        assert!(response.registration_access_token.is_none());
        assert!(response.registration_client_uri.is_none());
    }

    #[tokio::test]
    async fn test_public_client_has_no_secret() {
        let service = service();
        let response = service
            .create_client(
                ClientRequest {
                    token_endpoint_auth_method: "none".to_string(),
                    ..request()
                },
                true,
            )
            .await
            .unwrap();
        assert!(response.client_secret.is_none());
    }

    #[tokio::test]
    async fn test_disabled_registration() {
        let service = service().disable_registration();

        let result = service.create_client(request(), true).await;
        assert!(matches!(
            result,
            Err(ClientRegistrationError::RegistrationDisabled)
        ));

        service.create_client(request(), false).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_never_returns_secret() {
        let service = service();
        let created = service.create_client(request(), true).await.unwrap();
        let token = created.registration_access_token.unwrap();

        let admin = service
            .get_client(&created.client_id, &ClientServiceAuth::Administrator)
            .await
            .unwrap();
        assert!(admin.client_secret.is_none());
        assert!(admin.registration_access_token.is_none());

        let dynamic = service
            .get_client(&created.client_id, &ClientServiceAuth::RegistrationToken(token))
            .await
            .unwrap();
        assert!(dynamic.client_secret.is_none());
        assert!(dynamic.registration_access_token.is_none());

        let (clients, total) = service.list_clients(Pagination::default()).await.unwrap();
        assert_eq!(total, 1);
        assert!(clients.iter().all(|c| c.client_secret.is_none()));
    }

    #[tokio::test]
    async fn test_registration_token_isolation() {
        let service = service();
        let a = service.create_client(request(), true).await.unwrap();
        let b = service.create_client(request(), true).await.unwrap();
        let token_a = a.registration_access_token.unwrap();

        assert!(service.valid_dynamic_auth(&bearer(&token_a), &a.client_id).await.is_ok());
        assert!(matches!(
            service.valid_dynamic_auth(&bearer(&token_a), &b.client_id).await,
            Err(ClientRegistrationError::Unauthorized(_))
        ));
        assert!(matches!(
            service.valid_dynamic_auth(&HeaderMap::new(), &a.client_id).await,
            Err(ClientRegistrationError::Unauthorized(_))
        ));
        assert!(matches!(
            service.valid_dynamic_auth(&bearer(&token_a), "unknown").await,
            Err(ClientRegistrationError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_created_client_has_no_registration_token() {
        let service = service();
        let created = service.create_client(request(), false).await.unwrap();
        let result = service
            .valid_dynamic_auth(&bearer("guessed-token"), &created.client_id)
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_dynamic_update_rotates_registration_token() {
        let service = service();
        let created = service.create_client(request(), true).await.unwrap();
        let original = created.registration_access_token.unwrap();

        let updated = service
            .update_client(
                &created.client_id,
                &ClientServiceAuth::RegistrationToken(original.clone()),
                ClientRequest {
                    client_name: "Renamed".to_string(),
                    ..request()
                },
            )
            .await
            .unwrap();
        let replacement = updated.registration_access_token.unwrap();
        assert_ne!(replacement, original);
        assert_eq!(updated.client_name, "Renamed");
        assert!(updated.client_secret.is_none());

        assert!(matches!(
            service.valid_dynamic_auth(&bearer(&original), &created.client_id).await,
            Err(ClientRegistrationError::Unauthorized(_))
        ));
        assert!(
            service
                .valid_dynamic_auth(&bearer(&replacement), &created.client_id)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_dynamic_update_cannot_change_secret() {
        let service = service();
        let created = service.create_client(request(), true).await.unwrap();
        let secret = created.client_secret.unwrap();
        let token = created.registration_access_token.unwrap();
        let auth = ClientServiceAuth::RegistrationToken(token.clone());

        let result = service
            .update_client(
                &created.client_id,
                &auth,
                ClientRequest {
                    client_secret: Some("attacker-chosen".to_string()),
                    ..request()
                },
            )
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::Forbidden(_))));

        let result = service
            .update_client(
                &created.client_id,
                &auth,
                ClientRequest {
                    rotated_secrets: Some(Vec::new()),
                    ..request()
                },
            )
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::Forbidden(_))));

        assert!(service.manager().authenticate(&created.client_id, &secret).await.is_ok());
        assert!(
            service
                .manager()
                .authenticate(&created.client_id, "attacker-chosen")
                .await
                .is_err()
        );
        assert!(service.valid_dynamic_auth(&bearer(&token), &created.client_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_dynamic_update_preserves_admin_fields() {
        let service = service();
        let created = service.create_client(request(), true).await.unwrap();
        let token = created.registration_access_token.unwrap();

        let admin = service
            .update_client(
                &created.client_id,
                &ClientServiceAuth::Administrator,
                ClientRequest {
                    metadata: Some(json!({"tier": "gold"})),
                    skip_consent: true,
                    ..request()
                },
            )
            .await
            .unwrap();
        assert!(admin.registration_access_token.is_none());

        let result = service
            .update_client(
                &created.client_id,
                &ClientServiceAuth::RegistrationToken(token.clone()),
                ClientRequest {
                    metadata: Some(json!({"tier": "platinum"})),
                    ..request()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(ClientRegistrationError::InvalidClientMetadata(_))
        ));

        let updated = service
            .update_client(
                &created.client_id,
                &ClientServiceAuth::RegistrationToken(token),
                request(),
            )
            .await
            .unwrap();
        assert_eq!(updated.metadata, json!({"tier": "gold"}));
        assert!(updated.skip_consent);
    }

    #[tokio::test]
    async fn test_admin_rotation_and_clear() {
        let service = service();
        let created = service
            .create_client(
                ClientRequest {
                    client_id: Some("rotating".to_string()),
                    client_secret: Some("secret-one".to_string()),
                    ..request()
                },
                false,
            )
            .await
            .unwrap();
        let auth = ClientServiceAuth::Administrator;

        let rotated = service
            .update_client(
                &created.client_id,
                &auth,
                ClientRequest {
                    client_secret: Some("secret-two".to_string()),
                    ..request()
                },
            )
            .await
            .unwrap();
        assert_eq!(rotated.client_secret.as_deref(), Some("secret-two"));
        assert!(service.manager().authenticate("rotating", "secret-one").await.is_ok());
        assert!(service.manager().authenticate("rotating", "secret-two").await.is_ok());

        service
            .update_client(&created.client_id, &auth, request())
            .await
            .unwrap();
        assert!(service.manager().authenticate("rotating", "secret-one").await.is_ok());

        let result = service
            .update_client(
                &created.client_id,
                &auth,
                ClientRequest {
                    rotated_secrets: Some(vec!["$argon2id$forged".to_string()]),
                    ..request()
                },
            )
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::InvalidRequest(_))));

        service
            .update_client(
                &created.client_id,
                &auth,
                ClientRequest {
                    rotated_secrets: Some(Vec::new()),
                    client_secret: Some(String::new()),
                    ..request()
                },
            )
            .await
            .unwrap();
        assert!(service.manager().authenticate("rotating", "secret-one").await.is_err());
        assert!(service.manager().authenticate("rotating", "secret-two").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_cannot_change_client_id() {
        let service = service();
        let created = service.create_client(request(), false).await.unwrap();
        let result = service
            .update_client(
                &created.client_id,
                &ClientServiceAuth::Administrator,
                ClientRequest {
                    client_id: Some("other".to_string()),
                    ..request()
                },
            )
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_client() {
        let service = service();
        let a = service.create_client(request(), true).await.unwrap();
        let b = service.create_client(request(), true).await.unwrap();
        let token_a = a.registration_access_token.unwrap();

        let result = service
            .delete_client(&b.client_id, &ClientServiceAuth::RegistrationToken(token_a.clone()))
            .await;
        assert!(matches!(result, Err(ClientRegistrationError::Unauthorized(_))));

        service
            .delete_client(&a.client_id, &ClientServiceAuth::RegistrationToken(token_a))
            .await
            .unwrap();
        service
            .delete_client(&b.client_id, &ClientServiceAuth::Administrator)
            .await
            .unwrap();

        assert!(matches!(
            service
                .delete_client(&b.client_id, &ClientServiceAuth::Administrator)
                .await,
            Err(ClientRegistrationError::ClientNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_client_id() {
        let service = service();
        let first = ClientRequest {
            client_id: Some("fixed".to_string()),
            ..request()
        };
        service.create_client(first.clone(), false).await.unwrap();
        let err = service.create_client(first, false).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::CONFLICT);
    }
}

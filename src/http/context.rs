//! Application state shared by the HTTP handlers.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::AdminTokens;
use crate::oauth::clients::registration::ClientRegistrationService;
use crate::oauth::cors::CorsAuthorizer;

#[derive(Clone)]
pub struct AppState {
    /// Client registration service for both trust domains
    pub client_registration_service: Arc<ClientRegistrationService>,
    /// Per-request CORS decisions for the public routes
    pub cors_authorizer: Arc<CorsAuthorizer>,
    /// Bearer tokens accepted on the administrative routes
    pub admin_tokens: Arc<AdminTokens>,
}

impl FromRef<AppState> for Arc<ClientRegistrationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.client_registration_service.clone()
    }
}

impl FromRef<AppState> for Arc<CorsAuthorizer> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.cors_authorizer.clone()
    }
}

//! Administrator authentication for the `/clients` API.
//!
//! Requests must carry `Authorization: Bearer <token>` with one of the
//! configured administrator tokens. With no tokens configured every request
//! is rejected.

use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;
use subtle::ConstantTimeEq;

use crate::errors::ClientRegistrationError;
use crate::http::context::AppState;
use crate::oauth::clients::bearer_token;

/// Marker extracted once the caller proved administrator access.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl<S> FromRequestParts<S> for AdminAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ClientRegistrationError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ClientRegistrationError::Unauthorized("missing administrator token".to_string())
        })?;

        let admin_tokens: &Vec<String> = (*app_state.admin_tokens).as_ref();
        let accepted = admin_tokens.iter().fold(false, |found, candidate| {
            found | bool::from(candidate.as_bytes().ct_eq(token.as_bytes()))
        });

        if !accepted {
            tracing::warn!("administrator token rejected");
            return Err(ClientRegistrationError::Unauthorized(
                "invalid administrator token".to_string(),
            ));
        }
        Ok(AdminAuth)
    }
}

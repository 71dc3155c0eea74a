//! Handles `/oauth2/register` - self-service client registration (RFC 7591/7592)

use axum::{
    extract::{Json, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};

use crate::{
    errors::ClientRegistrationError,
    http::{context::AppState, handler_admin_clients::json_body},
    oauth::{
        clients::ClientServiceAuth,
        types::{ClientRequest, ClientResponse},
    },
};

pub async fn dynamic_register_client_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClientResponse>), ClientRegistrationError> {
    let request = json_body(payload)?;
    let response = state
        .client_registration_service
        .create_client(request, true)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn dynamic_get_client_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ClientResponse>, ClientRegistrationError> {
    let auth = ClientServiceAuth::from_headers(&headers)?;
    let response = state
        .client_registration_service
        .get_client(&client_id, &auth)
        .await?;
    Ok(Json(response))
}

pub async fn dynamic_update_client_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<ClientResponse>, ClientRegistrationError> {
    let auth = ClientServiceAuth::from_headers(&headers)?;
    let request = json_body(payload)?;
    let response = state
        .client_registration_service
        .update_client(&client_id, &auth, request)
        .await?;
    Ok(Json(response))
}

pub async fn dynamic_delete_client_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ClientRegistrationError> {
    let auth = ClientServiceAuth::from_headers(&headers)?;
    state
        .client_registration_service
        .delete_client(&client_id, &auth)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Handles the administrative `/clients` API.

use axum::{
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderName, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    errors::ClientRegistrationError,
    http::{context::AppState, middleware_admin::AdminAuth},
    oauth::{
        clients::ClientServiceAuth,
        types::{ClientRequest, ClientResponse, Pagination},
    },
};

const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

#[derive(Debug, Default, Deserialize)]
pub struct ListClientsQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ClientRegistrationError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ClientRegistrationError::InvalidRequest(rejection.body_text()))
}

pub async fn admin_create_client_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClientResponse>), ClientRegistrationError> {
    let request = json_body(payload)?;
    let response = state
        .client_registration_service
        .create_client(request, false)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn admin_list_clients_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    query: Result<Query<ListClientsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ClientRegistrationError> {
    let Query(query) =
        query.map_err(|rejection| ClientRegistrationError::InvalidRequest(rejection.body_text()))?;
    let pagination = Pagination::new(query.page, query.limit);

    let (clients, total) = state
        .client_registration_service
        .list_clients(pagination)
        .await?;
    Ok(([(TOTAL_COUNT_HEADER, total.to_string())], Json(clients)))
}

pub async fn admin_get_client_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(client_id): Path<String>,
) -> Result<Json<ClientResponse>, ClientRegistrationError> {
    let response = state
        .client_registration_service
        .get_client(&client_id, &ClientServiceAuth::Administrator)
        .await?;
    Ok(Json(response))
}

pub async fn admin_update_client_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(client_id): Path<String>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<ClientResponse>, ClientRegistrationError> {
    let request = json_body(payload)?;
    let response = state
        .client_registration_service
        .update_client(&client_id, &ClientServiceAuth::Administrator, request)
        .await?;
    Ok(Json(response))
}

pub async fn admin_delete_client_handler(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(client_id): Path<String>,
) -> Result<StatusCode, ClientRegistrationError> {
    state
        .client_registration_service
        .delete_client(&client_id, &ClientServiceAuth::Administrator)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

//! CORS middleware for the public registration routes.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::sync::Arc;

use crate::oauth::cors::{CorsAuthorizer, CorsDecision, is_valid_origin};

const EXPOSED_HEADERS: &str =
    "Cache-Control, Expires, Last-Modified, Pragma, Content-Length, Content-Language, Content-Type";
const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, Accept, Origin";
const PREFLIGHT_MAX_AGE: &str = "600";

fn insert_allow_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
}

fn append_vary_origin(headers: &mut HeaderMap) {
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}

fn preflight_response(origin: HeaderValue, request_headers: &HeaderMap) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    append_vary_origin(headers);

    if origin.to_str().is_ok_and(is_valid_origin) {
        insert_allow_headers(headers, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        let allow_headers = request_headers
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
    }
    response
}

/// Add CORS headers for origins the authorizer accepts.
///
/// Rejected origins get no CORS headers; the request itself still runs.
pub async fn cors_middleware(
    State(authorizer): State<Arc<CorsAuthorizer>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !authorizer.is_enabled() {
        return next.run(request).await;
    }

    let Some(origin) = request.headers().get(header::ORIGIN).cloned() else {
        return next.run(request).await;
    };

    if request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    {
        return preflight_response(origin, request.headers());
    }

    let decision = match origin.to_str() {
        Ok(value) => authorizer.authorize(value, request.headers()).await,
        Err(_) => CorsDecision::Deny,
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    append_vary_origin(headers);
    match decision {
        CorsDecision::Allow => insert_allow_headers(headers, origin),
        CorsDecision::Deny => {
            tracing::debug!(origin = ?origin, "cross-origin request without cors headers");
        }
        CorsDecision::Disabled => {}
    }
    response
}

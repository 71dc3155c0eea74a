//! Main router configuration assembling the client registry endpoints.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{
    context::AppState,
    handler_admin_clients::{
        admin_create_client_handler, admin_delete_client_handler, admin_get_client_handler,
        admin_list_clients_handler, admin_update_client_handler,
    },
    handler_dynamic_clients::{
        dynamic_delete_client_handler, dynamic_get_client_handler,
        dynamic_register_client_handler, dynamic_update_client_handler,
    },
    middleware_cors::cors_middleware,
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/clients",
            get(admin_list_clients_handler).post(admin_create_client_handler),
        )
        .route(
            "/clients/{client_id}",
            get(admin_get_client_handler)
                .put(admin_update_client_handler)
                .delete(admin_delete_client_handler),
        );

    let mut router = Router::new().merge(admin_routes);

    // Self-service registration is only mounted when enabled
    if ctx.client_registration_service.registration_enabled() {
        let dynamic_routes = Router::new()
            .route("/oauth2/register", post(dynamic_register_client_handler))
            .route(
                "/oauth2/register/{client_id}",
                get(dynamic_get_client_handler)
                    .put(dynamic_update_client_handler)
                    .delete(dynamic_delete_client_handler),
            )
            .layer(middleware::from_fn_with_state(
                ctx.cors_authorizer.clone(),
                cors_middleware,
            ));
        router = router.merge(dynamic_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminTokens;
    use crate::oauth::clients::validator::tests::validator;
    use crate::oauth::clients::{ClientManager, ClientRegistrationService};
    use crate::oauth::cors::CorsAuthorizer;
    use crate::oauth::introspection::StorageTokenIntrospector;
    use crate::oauth::registration_token::RegistrationTokenSigner;
    use crate::oauth::secrets::test_hasher;
    use crate::storage::MemoryOAuthStorage;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_app_state(dynamic_enabled: bool) -> AppState {
        let storage = Arc::new(MemoryOAuthStorage::new());
        let manager = ClientManager::new(storage.clone(), Arc::new(test_hasher()), None);
        let mut service = ClientRegistrationService::new(
            manager,
            validator(),
            RegistrationTokenSigner::new("router-test-secret"),
            "https://auth.example.com",
        );
        if !dynamic_enabled {
            service = service.disable_registration();
        }
        let cors_authorizer = CorsAuthorizer::new(
            false,
            Vec::new(),
            storage.clone(),
            Arc::new(StorageTokenIntrospector::new(storage)),
        );

        AppState {
            client_registration_service: Arc::new(service),
            cors_authorizer: Arc::new(cors_authorizer),
            admin_tokens: Arc::new(AdminTokens::try_from(Some("admin-token".to_string())).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let app = build_router(create_test_app_state(true));

        let response = app
            .clone()
            .oneshot(Request::get("/clients").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/clients")
                    .header("authorization", "Bearer admin-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-total-count"], "0");
    }

    #[tokio::test]
    async fn test_dynamic_routes_absent_when_disabled() {
        let app = build_router(create_test_app_state(false));
        let response = app
            .oneshot(
                Request::post("/oauth2/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dynamic_routes_mounted_when_enabled() {
        let app = build_router(create_test_app_state(true));
        let response = app
            .oneshot(
                Request::post("/oauth2/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

//! OAuth client registry server binary.
//!
//! Loads configuration from the environment, wires storage and the
//! registration service together and serves the HTTP API with graceful shutdown.

use anyhow::Result;
use oidc_registry::{
    config::Config,
    errors::StorageError,
    http::{AppState, build_router},
    oauth::{
        Argon2SecretHasher, ClientManager, ClientRegistrationService, ClientValidator,
        CorsAuthorizer, EgressPolicy, HttpSectorIdentifierFetcher, OriginPattern,
        RegistrationTokenSigner, StorageTokenIntrospector,
    },
    storage::{create_storage_backend, parse_storage_backend},
};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "oidc_registry=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = oidc_registry::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting oidc-registry");

    let config = Config::new()?;

    // Build HTTP client with certificate bundles
    let mut client_builder = reqwest::Client::builder();
    for ca_certificate in config.certificate_bundles.as_ref() {
        tracing::info!("Loading CA certificate: {:?}", ca_certificate);
        let cert = std::fs::read(ca_certificate)?;
        let cert = reqwest::Certificate::from_pem(&cert)?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    client_builder = client_builder
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref());

    let storage_backend = parse_storage_backend(
        &config.storage_backend,
        config.database_url.as_deref(),
        config.redis_url.as_deref(),
    )?;
    tracing::info!(backend = %config.storage_backend, "Initializing storage");
    let oauth_storage = create_storage_backend(storage_backend)
        .await
        .map_err(|e| {
            StorageError::DatabaseError(format!("Storage backend creation failed: {}", e))
        })?;

    let hasher = Arc::new(Argon2SecretHasher::new(config.secret_hash_cost)?);
    let manager = ClientManager::new(
        oauth_storage.clone(),
        hasher,
        *config.rotated_secrets_limit.as_ref(),
    );

    let default_client_scopes: &str = config.default_client_scopes.as_ref();
    let subject_types_supported: &Vec<String> = config.subject_types_supported.as_ref();
    let validator = ClientValidator::new(
        default_client_scopes,
        subject_types_supported.clone(),
        EgressPolicy::new(*config.disallow_private_ip_ranges.as_ref()),
        Arc::new(HttpSectorIdentifierFetcher::new(client_builder)?),
    );

    let mut client_registration_service = ClientRegistrationService::new(
        manager,
        validator,
        RegistrationTokenSigner::new(config.registration_token_secret.as_bytes()),
        config.external_base.clone(),
    );
    if !*config.enable_dynamic_registration.as_ref() {
        tracing::info!("Dynamic client registration is disabled");
        client_registration_service = client_registration_service.disable_registration();
    }

    let admin_tokens: &Vec<String> = config.admin_tokens.as_ref();
    if admin_tokens.is_empty() {
        tracing::warn!("ADMIN_TOKENS is not set; the administrative API will reject every request");
    }

    let cors_allowed_origins: &Vec<OriginPattern> = config.cors_allowed_origins.as_ref();
    let cors_authorizer = CorsAuthorizer::new(
        *config.cors_enabled.as_ref(),
        cors_allowed_origins.clone(),
        oauth_storage.clone(),
        Arc::new(StorageTokenIntrospector::new(oauth_storage.clone())),
    );

    // Create application context
    let app_context = AppState {
        client_registration_service: Arc::new(client_registration_service),
        cors_authorizer: Arc::new(cors_authorizer),
        admin_tokens: Arc::new(config.admin_tokens.clone()),
    };

    // Build the router
    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(err) => {
                    tracing::error!("failed to install signal handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Start HTTP server
    let http_port = *config.http_port.as_ref();
    let bind_address = format!("0.0.0.0:{http_port}");
    tracing::info!("Starting server on {bind_address}");
    let listener = TcpListener::bind(&bind_address).await?;

    {
        let inner_token = token.clone();
        tracker.spawn(async move {
            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}

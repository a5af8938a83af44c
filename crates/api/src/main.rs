//! Watch Shop API - authentication and order lifecycle backend.
//!
//! This binary serves the JSON API on port 4000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - Session tokens (HS256) issued on password or Google sign-in
//! - `PostgreSQL` or a JSON document as the credential and order store
//!
//! Migrations are NOT run automatically on startup. Run them explicitly via:
//! `cargo run -p watch-shop-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use tokio::net::TcpListener;

use watch_shop_api::config::ApiConfig;
use watch_shop_api::db::Backend;
use watch_shop_api::services::seed::seed_admin;
use watch_shop_api::{AppState, app, telemetry};

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.log_format);

    if config.uses_default_store() {
        tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
    }

    let store = Backend::connect(&config.database_url)
        .await
        .expect("Failed to open store");
    tracing::info!(backend = store.kind(), "Store opened");

    let state = AppState::new(config.clone(), store);

    // Seeding failures are logged and never block startup
    if let Some(seed) = &config.admin_seed {
        seed_admin(state.store(), state.tokens(), state.google(), seed).await;
    }
    if config.google.client_id.is_none() {
        tracing::warn!("GOOGLE_CLIENT_ID not set, Google sign-in will reject all tokens");
    }

    let app = app(state);

    // Start server
    let addr = config.socket_addr();
    tracing::info!("API listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

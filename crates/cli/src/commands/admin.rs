//! Admin account management.
//!
//! # Usage
//!
//! ```bash
//! ws-cli admin create -e admin@example.com -n "Admin Name" -p 'long-password'
//! ```
//!
//! # Environment Variables
//!
//! Reads the same configuration as the API server (`DATABASE_URL`,
//! `JWT_SECRET`, ...), so the account lands in the store the server uses.

use thiserror::Error;

use watch_shop_api::config::{ApiConfig, ConfigError};
use watch_shop_api::db::{Backend, RepositoryError};
use watch_shop_api::services::auth::{AuthError, AuthService, GoogleVerifier, SessionTokens};
use watch_shop_core::{Role, UserId};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("{0}")]
    Auth(AuthError),
}

/// Fields of a new admin account.
#[derive(Debug, Clone)]
pub struct NewAdmin<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password: &'a str,
    pub phone: &'a str,
}

/// Create an admin user in the configured store.
///
/// # Errors
///
/// Returns [`AdminError::UserExists`] if the email is registered already, and
/// other variants for invalid input, configuration or store failures.
pub async fn create_user(admin: &NewAdmin<'_>) -> Result<UserId, AdminError> {
    let config = ApiConfig::from_env()?;

    tracing::info!("Opening store...");
    let store = Backend::connect(&config.database_url).await?;
    if !matches!(store, Backend::Postgres(_)) {
        tracing::warn!(backend = store.kind(), "Store is not PostgreSQL");
    }

    create_in(&store, &config, admin).await
}

async fn create_in(
    store: &Backend,
    config: &ApiConfig,
    admin: &NewAdmin<'_>,
) -> Result<UserId, AdminError> {
    let tokens = SessionTokens::new(&config.jwt_secret);
    let google = GoogleVerifier::new(&config.google);

    tracing::info!("Creating admin user: {}", admin.email);
    let user = AuthService::new(store, &tokens, &google)
        .create_account(
            admin.name.trim(),
            admin.email.trim(),
            admin.phone.trim(),
            admin.password,
            Role::Admin,
        )
        .await
        .map_err(|e| match e {
            AuthError::DuplicateEmail => AdminError::UserExists(admin.email.to_owned()),
            other => AdminError::Auth(other),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ws-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - store URL; only `postgres://` stores have migrations
//!
//! Migrations are embedded from `crates/api/migrations/`.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use watch_shop_api::db::{RepositoryError, StoreLocation, postgres};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Unsupported store: {0}")]
    Store(#[from] RepositoryError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// What [`run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Applied,
    /// The configured store keeps no schema.
    NotNeeded,
}

/// Run the embedded migrations against `DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing or unsupported, or the
/// migrations fail.
pub async fn run() -> Result<MigrationOutcome, MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("DATABASE_URL"))?;

    migrate(&database_url).await
}

async fn migrate(database_url: &SecretString) -> Result<MigrationOutcome, MigrationError> {
    match StoreLocation::parse(database_url.expose_secret())? {
        StoreLocation::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = postgres::create_pool(database_url).await?;

            tracing::info!("Running migrations...");
            postgres::run_migrations(&pool).await?;

            tracing::info!("Migrations complete!");
            Ok(MigrationOutcome::Applied)
        }
        StoreLocation::File(path) => {
            tracing::info!(
                path = %path.display(),
                "JSON file store needs no migrations, nothing to do"
            );
            Ok(MigrationOutcome::NotNeeded)
        }
        StoreLocation::Memory => {
            tracing::info!("In-memory store needs no migrations, nothing to do");
            Ok(MigrationOutcome::NotNeeded)
        }
    }
}

//! Startup admin account.

use secrecy::ExposeSecret;
use tracing::{error, info};

use watch_shop_core::Role;

use crate::config::AdminSeed;
use crate::db::UserStore;
use crate::services::auth::{AuthError, AuthService, GoogleVerifier, SessionTokens};

/// Outcome of [`seed_admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyPresent,
    Failed,
}

/// Create the configured admin account unless one with that email exists.
///
/// Never fails: problems are logged and the server keeps starting.
pub async fn seed_admin<S: UserStore>(
    store: &S,
    tokens: &SessionTokens,
    google: &GoogleVerifier,
    seed: &AdminSeed,
) -> SeedOutcome {
    let auth = AuthService::new(store, tokens, google);
    let result = auth
        .create_account(
            "Admin",
            &seed.email,
            "",
            seed.password.expose_secret(),
            Role::Admin,
        )
        .await;

    match result {
        Ok(user) => {
            info!(user_id = %user.id, email = %seed.email, "Seeded admin account");
            SeedOutcome::Created
        }
        Err(AuthError::DuplicateEmail) => {
            info!(email = %seed.email, "Admin account already present");
            SeedOutcome::AlreadyPresent
        }
        Err(e) => {
            error!(email = %seed.email, error = %e, "Failed to seed admin account");
            SeedOutcome::Failed
        }
    }
}

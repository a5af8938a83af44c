//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Backend;
use crate::services::auth::{GoogleVerifier, SessionTokens};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the token signer and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Backend,
    tokens: SessionTokens,
    google: GoogleVerifier,
}

impl AppState {
    /// Create a new application state that verifies Google tokens against
    /// Google's published keys.
    #[must_use]
    pub fn new(config: ApiConfig, store: Backend) -> Self {
        let google = GoogleVerifier::new(&config.google);
        Self::with_google(config, store, google)
    }

    /// Create a new application state with a specific Google verifier.
    #[must_use]
    pub fn with_google(config: ApiConfig, store: Backend, google: GoogleVerifier) -> Self {
        let tokens = SessionTokens::new(&config.jwt_secret);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                google,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the credential and order store.
    #[must_use]
    pub fn store(&self) -> &Backend {
        &self.inner.store
    }

    /// Get a reference to the session token signer.
    #[must_use]
    pub fn tokens(&self) -> &SessionTokens {
        &self.inner.tokens
    }

    /// Get a reference to the Google ID token verifier.
    #[must_use]
    pub fn google(&self) -> &GoogleVerifier {
        &self.inner.google
    }
}

//! Google ID token verification.
//!
//! Tokens are RS256 JWTs signed with one of the keys Google publishes as a
//! JWK set. The set is fetched lazily and cached for an hour. A token whose
//! `kid` is not in the cached set forces a refetch, at most once per
//! [`FORCED_REFRESH_INTERVAL`]; inside that window unknown keys are rejected
//! straight away. A failed refetch leaves the cached set in place.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::AuthError;
use crate::config::GoogleConfig;

/// Issuers Google uses for ID tokens.
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

const JWKS_CACHE_KEY: &str = "google";

/// Minimum spacing between refetches triggered by an unknown `kid`.
pub const FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    /// Google's stable account id (`sub`).
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

struct RemoteKeys {
    http: reqwest::Client,
    url: String,
    cache: Cache<&'static str, Arc<JwkSet>>,
    /// Holds an entry while a forced refetch is not allowed.
    refresh_guard: Cache<&'static str, ()>,
}

enum KeySource {
    Remote(RemoteKeys),
    Static(Arc<JwkSet>),
}

struct Inner {
    client_id: Option<String>,
    keys: KeySource,
}

/// Verifies Google ID tokens for the configured OAuth client.
#[derive(Clone)]
pub struct GoogleVerifier {
    inner: Arc<Inner>,
}

impl GoogleVerifier {
    /// Verifier that fetches Google's published keys.
    #[must_use]
    pub fn new(config: &GoogleConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(3600))
            .build();
        let refresh_guard = Cache::builder()
            .max_capacity(1)
            .time_to_live(FORCED_REFRESH_INTERVAL)
            .build();

        Self {
            inner: Arc::new(Inner {
                client_id: config.client_id.clone(),
                keys: KeySource::Remote(RemoteKeys {
                    http: reqwest::Client::new(),
                    url: config.jwks_url.clone(),
                    cache,
                    refresh_guard,
                }),
            }),
        }
    }

    /// Verifier with a fixed key set that never touches the network.
    #[must_use]
    pub fn with_keys(client_id: Option<String>, keys: JwkSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                client_id,
                keys: KeySource::Static(Arc::new(keys)),
            }),
        }
    }

    /// Verify `id_token` and extract the identity it asserts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if no client id is configured, if
    /// Google's keys cannot be retrieved, or if the token fails signature,
    /// audience, issuer or expiry checks.
    #[instrument(skip_all)]
    pub async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, AuthError> {
        let Some(client_id) = self.inner.client_id.as_deref() else {
            warn!("Google sign-in attempted but GOOGLE_CLIENT_ID is not configured");
            return Err(AuthError::InvalidToken);
        };

        let header = jsonwebtoken::decode_header(id_token).map_err(|e| {
            debug!(error = %e, "Unparseable Google token header");
            AuthError::InvalidToken
        })?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken);
        }
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let keys = self.key_set(&kid).await?;
        let jwk = keys.find(&kid).ok_or_else(|| {
            debug!(kid = %kid, "Google token signed with unknown key");
            AuthError::InvalidToken
        })?;
        let key = DecodingKey::from_jwk(jwk).map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let claims = jsonwebtoken::decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| {
                debug!(error = %e, "Google token rejected");
                AuthError::InvalidToken
            })?
            .claims;

        if claims.email_verified == Some(false) {
            debug!("Google account email is not verified");
            return Err(AuthError::InvalidToken);
        }
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(AuthError::InvalidToken)?;

        Ok(GoogleIdentity {
            subject: claims.sub,
            email,
            name: claims.name.filter(|n| !n.trim().is_empty()),
            picture: claims.picture.filter(|p| !p.trim().is_empty()),
        })
    }

    /// A key set that should contain `kid`.
    async fn key_set(&self, kid: &str) -> Result<Arc<JwkSet>, AuthError> {
        match &self.inner.keys {
            KeySource::Static(keys) => Ok(Arc::clone(keys)),
            KeySource::Remote(remote) => remote.key_set(kid).await,
        }
    }
}

impl RemoteKeys {
    async fn key_set(&self, kid: &str) -> Result<Arc<JwkSet>, AuthError> {
        let keys = self
            .cache
            .try_get_with(JWKS_CACHE_KEY, fetch_jwks(&self.http, &self.url))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch Google signing keys");
                AuthError::InvalidToken
            })?;
        if keys.find(kid).is_some() {
            return Ok(keys);
        }

        let due = self
            .refresh_guard
            .entry(JWKS_CACHE_KEY)
            .or_insert(())
            .await
            .is_fresh();
        if !due {
            debug!(kid, "Unknown key, forced refresh not due yet");
            return Ok(keys);
        }

        debug!(kid, "Key not in cached Google key set, refetching");
        match fetch_jwks(&self.http, &self.url).await {
            Ok(fresh) => {
                self.cache.insert(JWKS_CACHE_KEY, Arc::clone(&fresh)).await;
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh Google signing keys");
                Ok(keys)
            }
        }
    }
}

async fn fetch_jwks(http: &reqwest::Client, url: &str) -> Result<Arc<JwkSet>, reqwest::Error> {
    debug!(url, "Fetching Google signing keys");
    let keys = http
        .get(url)
        .timeout(Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?
        .json::<JwkSet>()
        .await?;
    Ok(Arc::new(keys))
}

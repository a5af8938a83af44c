//! Session token issuance and validation (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use watch_shop_core::{Role, UserId};

use super::AuthError;
use crate::models::UserRecord;

/// How long a session token stays valid.
pub const SESSION_TTL: Duration = Duration::days(7);

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Signs and verifies session tokens with the server secret.
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    /// Tokens valid for [`SESSION_TTL`].
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        Self::with_ttl(secret, SESSION_TTL)
    }

    /// Tokens valid for `ttl`. A negative ttl mints already-expired tokens.
    #[must_use]
    pub fn with_ttl(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenIssue` if signing fails.
    pub fn issue(&self, user: &UserRecord) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.as_str().to_owned(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(AuthError::TokenIssue)
    }

    /// Validate signature and expiry and return the claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for a bad signature, an expired token,
    /// or anything that does not parse as a session token.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                AuthError::InvalidToken
            })?;
        Ok(data.claims)
    }
}

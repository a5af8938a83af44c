//! Bearer token extractor.
//!
//! Handlers that take [`RequireAuth`] only run for requests carrying a valid,
//! unexpired session token in `Authorization: Bearer <token>`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::Claims;
use crate::services::orders::Caller;
use crate::state::AppState;

/// Extractor that requires a valid session token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(claims): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", claims.email)
/// }
/// ```
pub struct RequireAuth(pub Claims);

impl RequireAuth {
    /// The caller identity the order service checks ownership against.
    #[must_use]
    pub fn caller(&self) -> Caller {
        Caller::from(&self.0)
    }
}

/// Message for a request without a bearer token.
pub const MISSING_TOKEN: &str = "No token provided";

/// Message for a bearer token that fails signature or expiry checks.
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// The token in an `Authorization: Bearer` header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized(MISSING_TOKEN.to_owned()))?;
        let claims = state
            .tokens()
            .validate(token)
            .map_err(|_| AppError::Unauthorized(INVALID_TOKEN.to_owned()))?;

        Span::current().record("user_id", tracing::field::display(claims.sub));
        set_sentry_user(&claims.sub, Some(&claims.email));

        Ok(Self(claims))
    }
}

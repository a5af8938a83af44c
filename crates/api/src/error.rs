//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is `{"message": "..."}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use watch_shop_core::{ErrorBody, TransitionError};

use crate::services::auth::AuthError;
use crate::services::orders::OrderError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(err) => match err {
                AuthError::MissingFields
                | AuthError::InvalidEmail(_)
                | AuthError::WeakPassword { .. } => StatusCode::BAD_REQUEST,
                AuthError::DuplicateEmail => StatusCode::CONFLICT,
                AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenIssue(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Order(err) => match err {
                OrderError::MissingFields
                | OrderError::EmptyOrder
                | OrderError::InvalidLineItem(_)
                | OrderError::TotalMismatch
                | OrderError::MissingStatus
                | OrderError::InvalidStatus(_)
                | OrderError::Transition(_) => StatusCode::BAD_REQUEST,
                OrderError::UnknownUser | OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Forbidden => StatusCode::FORBIDDEN,
                OrderError::ConcurrentModification => StatusCode::CONFLICT,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to clients.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Auth(err) => match err {
                AuthError::MissingFields => "Missing fields".to_owned(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::WeakPassword { .. } | AuthError::InvalidToken => {
                    capitalize(&err.to_string())
                }
                AuthError::DuplicateEmail => "Email already exists".to_owned(),
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_owned()
                }
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenIssue(_) => {
                    "Internal server error".to_owned()
                }
            },
            Self::Order(err) => match err {
                OrderError::Repository(_) => "Internal server error".to_owned(),
                OrderError::Transition(TransitionError::AlreadyCancelled) => {
                    "Order is already cancelled".to_owned()
                }
                OrderError::Transition(TransitionError::NotCancellable(status)) => {
                    format!("Cannot cancel order in {status} status")
                }
                other => capitalize(&other.to_string()),
            },
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            message: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

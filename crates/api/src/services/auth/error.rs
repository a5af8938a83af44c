//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required request field was blank.
    #[error("missing fields")]
    MissingFields,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] watch_shop_core::EmailError),

    /// Password too short.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// An account with this email already exists.
    #[error("email already exists")]
    DuplicateEmail,

    /// Unknown email, wrong password, or a Google-only account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A session or Google token failed verification.
    #[error("invalid token")]
    InvalidToken,

    /// The token subject no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Signing a session token failed.
    #[error("token signing error: {0}")]
    TokenIssue(jsonwebtoken::errors::Error),
}

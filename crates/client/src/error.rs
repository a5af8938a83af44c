//! Client error types.

use thiserror::Error;

/// Errors returned by the API client and account repositories.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    /// The server could not be reached at all.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a body the client does not understand.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The configured base URL is not a valid URL.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// A required field was blank.
    #[error("missing fields")]
    MissingFields,

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] watch_shop_core::EmailError),

    /// Password too short.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// A local account with this email already exists.
    #[error("email already exists")]
    DuplicateEmail,

    /// Unknown email or wrong password for a local account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Reading or writing a local file failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A local file could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened before the server could answer.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::Unreachable(e.to_string())
        } else if e.is_decode() {
            Self::UnexpectedResponse(e.to_string())
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

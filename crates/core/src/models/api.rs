//! JSON request and response bodies of the HTTP API.
//!
//! Request fields are deliberately loose (`String`, `Option`) so the server
//! can report missing or malformed input with its own error messages instead
//! of a generic deserialization failure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::order::LineItem;
use crate::models::user::UserProfile;
use crate::types::UserId;

/// Header carrying the client-supplied idempotency key on order creation.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shortest password registration accepts, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Whether `password` is long enough to register with.
#[must_use]
pub fn password_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// `POST /api/auth/register`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

/// `POST /api/auth/login`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/google`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

/// Successful authentication: the account and a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

/// `POST /api/orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub total: Decimal,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// `PATCH /api/orders/{orderId}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

/// `POST /api/orders/{orderId}/cancel`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: DateTime<Utc>,
}

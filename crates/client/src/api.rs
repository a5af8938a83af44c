//! Typed HTTP client for the Watch Shop API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use watch_shop_core::{
    AuthResponse, CancelOrderRequest, CreateOrderRequest, ErrorBody, GoogleLoginRequest,
    HealthResponse, IDEMPOTENCY_KEY_HEADER, LoginRequest, OrderDetails, OrderId,
    RegisterRequest, UpdateStatusRequest, UserId, UserProfile,
};

use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of placing an order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: OrderDetails,
    /// `true` when the server returned an order created by an earlier request
    /// with the same idempotency key.
    pub replayed: bool,
}

/// Client for the JSON API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the API served at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse or the HTTP client cannot
    /// be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner { http, base_url }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.inner.base_url.join(path)?;
        Ok(self.inner.http.request(method, url))
    }

    fn authed(
        &self,
        method: Method,
        path: &str,
        token: &str,
    ) -> Result<RequestBuilder, ClientError> {
        Ok(self.request(method, path)?.bearer_auth(token))
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// `POST /api/auth/register`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] on a rejected registration and
    /// [`ClientError::Unreachable`] if the server cannot be reached.
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        send_json(self.request(Method::POST, "api/auth/register")?.json(req)).await
    }

    /// `POST /api/auth/login`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] on bad credentials and
    /// [`ClientError::Unreachable`] if the server cannot be reached.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        send_json(self.request(Method::POST, "api/auth/login")?.json(&body)).await
    }

    /// `POST /api/auth/google`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the ID token is rejected.
    pub async fn google(&self, id_token: &str) -> Result<AuthResponse, ClientError> {
        let body = GoogleLoginRequest {
            id_token: id_token.to_owned(),
        };
        send_json(self.request(Method::POST, "api/auth/google")?.json(&body)).await
    }

    /// `GET /api/auth/me`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 401 for a missing or expired token.
    pub async fn me(&self, token: &str) -> Result<UserProfile, ClientError> {
        send_json(self.authed(Method::GET, "api/auth/me", token)?).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// `POST /api/orders`, optionally with an `Idempotency-Key` header.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the order is rejected.
    pub async fn create_order(
        &self,
        token: &str,
        req: &CreateOrderRequest,
        idempotency_key: Option<&str>,
    ) -> Result<PlacedOrder, ClientError> {
        let mut builder = self.authed(Method::POST, "api/orders", token)?.json(req);
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }

        let response = check(builder.send().await?).await?;
        let replayed = response.status() == StatusCode::OK;
        let order = decode(response).await?;
        Ok(PlacedOrder { order, replayed })
    }

    /// `GET /api/orders/user/{userId}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 403 when listing another
    /// user's orders without the admin role.
    pub async fn orders_for_user(
        &self,
        token: &str,
        user_id: UserId,
    ) -> Result<Vec<OrderDetails>, ClientError> {
        let path = format!("api/orders/user/{user_id}");
        send_json(self.authed(Method::GET, &path, token)?).await
    }

    /// `GET /api/orders` (admin only).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 403 for non-admin tokens.
    pub async fn all_orders(&self, token: &str) -> Result<Vec<OrderDetails>, ClientError> {
        send_json(self.authed(Method::GET, "api/orders", token)?).await
    }

    /// `GET /api/orders/{orderId}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 for unknown orders.
    pub async fn order(&self, token: &str, order_id: OrderId) -> Result<OrderDetails, ClientError> {
        let path = format!("api/orders/{order_id}");
        send_json(self.authed(Method::GET, &path, token)?).await
    }

    /// `PATCH /api/orders/{orderId}` (admin only).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for forbidden or invalid transitions.
    pub async fn update_status(
        &self,
        token: &str,
        order_id: OrderId,
        status: &str,
    ) -> Result<OrderDetails, ClientError> {
        let path = format!("api/orders/{order_id}");
        let body = UpdateStatusRequest {
            status: Some(status.to_owned()),
        };
        send_json(self.authed(Method::PATCH, &path, token)?.json(&body)).await
    }

    /// `POST /api/orders/{orderId}/cancel`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the order can no longer be cancelled.
    pub async fn cancel(
        &self,
        token: &str,
        order_id: OrderId,
        reason: Option<&str>,
    ) -> Result<OrderDetails, ClientError> {
        let path = format!("api/orders/{order_id}/cancel");
        let body = CancelOrderRequest {
            reason: reason.map(str::to_owned),
        };
        send_json(self.authed(Method::POST, &path, token)?.json(&body)).await
    }

    /// `GET /api/health`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unreachable`] if the server is down.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        send_json(self.request(Method::GET, "api/health")?).await
    }
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
    let response = check(builder.send().await?).await?;
    decode(response).await
}

/// Turn non-success responses into [`ClientError::Api`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text).map_or_else(
        |_| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_owned()
        },
        |body| body.message,
    );

    tracing::debug!(status = status.as_u16(), %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
}

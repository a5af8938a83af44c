//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET   /api/health                  - Liveness
//! GET   /api/health/ready            - Readiness (store reachable)
//!
//! # Auth
//! POST  /api/auth/register           - Create account, returns {user, token}
//! POST  /api/auth/login              - Password login
//! POST  /api/auth/google             - Google ID token sign-in
//! GET   /api/auth/me                 - Current profile (bearer)
//!
//! # Orders (bearer)
//! POST  /api/orders                  - Place order (Idempotency-Key optional)
//! GET   /api/orders                  - All orders (admin)
//! GET   /api/orders/user/{userId}    - Orders of one user
//! GET   /api/orders/{orderId}        - One order
//! PATCH /api/orders/{orderId}        - Change status (admin); PUT is an alias
//! POST  /api/orders/{orderId}/cancel - Cancel with optional reason
//! ```

pub mod auth;
pub mod health;
pub mod orders;

use std::time::Duration;

use axum::{
    Router,
    extract::FromRequest,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::state::AppState;

/// JSON body extractor whose rejections use the API's error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", post(auth::google))
        .route("/me", get(auth::me))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create).get(orders::list_all))
        .route("/user/{user_id}", get(orders::list_for_user))
        .route(
            "/{order_id}",
            get(orders::show)
                .patch(orders::update_status)
                .put(orders::update_status),
        )
        .route("/{order_id}/cancel", post(orders::cancel))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes())
        .nest("/api/orders", order_routes())
}

/// Build the complete application: routes, middleware and state.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);

    routes()
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the browser front end. An empty list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(watch_shop_core::IDEMPOTENCY_KEY_HEADER),
            request_id.clone(),
        ])
        .expose_headers([request_id]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (reuse or generate `x-request-id`)
//! 4. CORS
//!
//! Authentication is not a layer: handlers opt in with [`RequireAuth`].

pub mod auth;
pub mod request_id;

pub use auth::RequireAuth;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};

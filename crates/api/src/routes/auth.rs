//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};

use watch_shop_core::{AuthResponse, GoogleLoginRequest, LoginRequest, RegisterRequest, UserProfile};

use crate::db::Backend;
use crate::error::{Result, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::routes::ApiJson;
use crate::services::auth::AuthService;
use crate::state::AppState;

fn auth_service(state: &AppState) -> AuthService<'_, Backend> {
    AuthService::new(state.store(), state.tokens(), state.google())
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let response = auth_service(&state).register(&req).await?;
    set_sentry_user(&response.user.id, Some(response.user.email.as_str()));
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = auth_service(&state).login(&req.email, &req.password).await?;
    set_sentry_user(&response.user.id, Some(response.user.email.as_str()));
    Ok(Json(response))
}

/// `POST /api/auth/google`
pub async fn google(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GoogleLoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = auth_service(&state).google_sign_in(&req.id_token).await?;
    set_sentry_user(&response.user.id, Some(response.user.email.as_str()));
    Ok(Json(response))
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, auth: RequireAuth) -> Result<Json<UserProfile>> {
    let profile = auth_service(&state).current_user(&auth.0).await?;
    Ok(Json(profile))
}

//! Integration tests for registration, login and bearer tokens.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use watch_shop_api::db::UserStore;
use watch_shop_core::Role;
use watch_shop_integration_tests::{
    ADMIN_EMAIL, ADMIN_PASSWORD, PASSWORD, TestServer, google_claims, sign_google,
};

async fn message(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["message"].as_str().unwrap_or_default().to_owned()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_ok_with_request_id() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .get(server.url("/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert!(body["time"].is_string());

    let ready = server
        .http
        .get(server.url("/api/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_returns_user_and_token() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .post(server.url("/api/auth/register"))
        .json(&json!({
            "fullName": "Tran Thi B",
            "email": "b@test.com",
            "phone": "0912345678",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await.unwrap();
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["email"], "b@test.com");
    assert_eq!(body["user"]["fullName"], "Tran Thi B");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let server = TestServer::spawn().await;
    server.register("dup@test.com").await;

    let resp = server
        .http
        .post(server.url("/api/auth/register"))
        .json(&json!({
            "fullName": "Someone Else",
            "email": "dup@test.com",
            "password": "another1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(message(resp).await, "Email already exists");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let server = TestServer::spawn().await;

    let cases = [
        (json!({"email": "x@test.com", "password": PASSWORD}), "Missing fields"),
        (
            json!({"fullName": "X", "email": "x@test.com", "password": "12345"}),
            "Password must be at least 6 characters",
        ),
    ];

    for (body, expected) in cases {
        let resp = server
            .http
            .post(server.url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(message(resp).await, expected);
    }

    let resp = server
        .http
        .post(server.url("/api/auth/register"))
        .json(&json!({"fullName": "X", "email": "not-an-email", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_after_register() {
    let server = TestServer::spawn().await;
    let registered = server.register("login@test.com").await;

    let resp = server
        .http
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": "login@test.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["id"], registered.user.id.to_string());
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_identically() {
    let server = TestServer::spawn().await;
    server.register("login@test.com").await;

    for body in [
        json!({"email": "login@test.com", "password": "wrong-password"}),
        json!({"email": "nobody@test.com", "password": PASSWORD}),
    ] {
        let resp = server
            .http
            .post(server.url("/api/auth/login"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(resp).await, "Invalid credentials");
    }
}

#[tokio::test]
async fn test_login_missing_fields() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": "login@test.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(message(resp).await, "Missing fields");
}

#[tokio::test]
async fn test_seeded_admin_can_log_in() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .post(server.url("/api/auth/login"))
        .json(&json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["role"], "admin");
}

// ============================================================================
// Bearer tokens
// ============================================================================

#[tokio::test]
async fn test_me_returns_current_profile() {
    let server = TestServer::spawn().await;
    let auth = server.register("me@test.com").await;

    let resp = server
        .http
        .get(server.url("/api/auth/me"))
        .bearer_auth(&auth.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], auth.user.id.to_string());
    assert_eq!(body["email"], "me@test.com");
}

#[tokio::test]
async fn test_me_without_token() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .get(server.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(message(resp).await, "No token provided");
}

#[tokio::test]
async fn test_me_with_garbage_token() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .get(server.url("/api/auth/me"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(message(resp).await, "Invalid or expired token");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let server = TestServer::spawn().await;
    let auth = server.register("expired@test.com").await;

    let user = server
        .state
        .store()
        .user_by_id(auth.user.id)
        .await
        .unwrap()
        .unwrap();
    let expired = server.expired_token(&user);

    let resp = server
        .http
        .get(server.url("/api/auth/me"))
        .bearer_auth(&expired)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(message(resp).await, "Invalid or expired token");
}

// ============================================================================
// Google sign-in
// ============================================================================

#[tokio::test]
async fn test_google_sign_in_creates_then_reuses_account() {
    let server = TestServer::spawn().await;
    let id_token = sign_google(&google_claims("google-123", "shopper@gmail.com"));

    let first: Value = server
        .http
        .post(server.url("/api/auth/google"))
        .json(&json!({"idToken": id_token}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["user"]["email"], "shopper@gmail.com");
    assert_eq!(first["user"]["googleId"], "google-123");
    assert_eq!(first["user"]["fullName"], "Google Shopper");
    assert!(first["token"].is_string());

    let second: Value = server
        .http
        .post(server.url("/api/auth/google"))
        .json(&json!({"idToken": id_token}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["user"]["id"], first["user"]["id"]);
}

#[tokio::test]
async fn test_google_sign_in_links_existing_password_account() {
    let server = TestServer::spawn().await;
    let registered = server.register("linked@gmail.com").await;

    let id_token = sign_google(&google_claims("google-456", "linked@gmail.com"));
    let resp = server
        .http
        .post(server.url("/api/auth/google"))
        .json(&json!({"idToken": id_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["id"], registered.user.id.to_string());
    assert_eq!(body["user"]["googleId"], "google-456");

    // The password still works after linking.
    let login = server
        .client()
        .login("linked@gmail.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(login.user.id, registered.user.id);
    assert_eq!(login.user.role, Role::User);
}

#[tokio::test]
async fn test_google_sign_in_rejects_foreign_audience() {
    let server = TestServer::spawn().await;

    let mut claims = google_claims("google-789", "someone@gmail.com");
    claims["aud"] = json!("another-app.apps.googleusercontent.com");

    let resp = server
        .http
        .post(server.url("/api/auth/google"))
        .json(&json!({"idToken": sign_google(&claims)}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_google_sign_in_requires_token() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .post(server.url("/api/auth/google"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(message(resp).await, "Missing fields");
}

#[tokio::test]
async fn test_tokens_name_distinct_users() {
    let server = TestServer::spawn().await;
    let a = server.register("a@test.com").await;
    let b = server.register("b@test.com").await;

    assert_ne!(a.user.id, b.user.id);
    assert_ne!(a.token, b.token);
}

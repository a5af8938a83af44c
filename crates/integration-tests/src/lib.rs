//! Integration tests for Watch Shop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p watch-shop-integration-tests
//! ```
//!
//! Each test boots the real router on `127.0.0.1:0` with a fresh in-memory
//! store, a seeded admin account and a Google verifier that trusts the key in
//! `crates/api/testdata/`. No external services are needed.
//!
//! # Test Categories
//!
//! - `auth` - Registration, login, Google sign-in, bearer tokens
//! - `orders` - Order creation, ownership, lifecycle, idempotency
//! - `client` - Client crate against a live server

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use chrono::Duration;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use watch_shop_api::config::{AdminSeed, ApiConfig};
use watch_shop_api::db::Backend;
use watch_shop_api::db::file::JsonFileStore;
use watch_shop_api::models::UserRecord;
use watch_shop_api::services::auth::{GoogleVerifier, SessionTokens};
use watch_shop_api::services::seed::seed_admin;
use watch_shop_api::{AppState, app};
use watch_shop_client::ApiClient;
use watch_shop_core::{AuthResponse, CreateOrderRequest, LineItem, RegisterRequest, UserId};

pub const JWT_SECRET: &str = "k7Qp2xVn9LmR4tWz8YbC3dFh6JsA1gEu";
pub const GOOGLE_CLIENT_ID: &str = "watch-shop-test.apps.googleusercontent.com";
pub const ADMIN_EMAIL: &str = "admin@watchshop.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "secret1";

const GOOGLE_KEY_PEM: &[u8] = include_bytes!("../../api/testdata/google_test_key.pem");
const GOOGLE_JWKS: &str = include_str!("../../api/testdata/google_test_jwks.json");
const GOOGLE_KID: &str = "test-key-1";

/// A running API server.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub http: reqwest::Client,
}

impl TestServer {
    /// Boot a server with an empty in-memory store and the seeded admin.
    pub async fn spawn() -> Self {
        let mut config = ApiConfig::local(SecretString::from(JWT_SECRET));
        config.google.client_id = Some(GOOGLE_CLIENT_ID.to_owned());
        config.admin_seed = Some(AdminSeed {
            email: ADMIN_EMAIL.to_owned(),
            password: SecretString::from(ADMIN_PASSWORD),
        });

        let keys: JwkSet = serde_json::from_str(GOOGLE_JWKS).unwrap();
        let google = GoogleVerifier::with_keys(Some(GOOGLE_CLIENT_ID.to_owned()), keys);
        let state = AppState::with_google(
            config.clone(),
            Backend::File(JsonFileStore::in_memory()),
            google,
        );

        if let Some(seed) = &config.admin_seed {
            seed_admin(state.store(), state.tokens(), state.google(), seed).await;
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            http: reqwest::Client::new(),
        }
    }

    /// Absolute URL of `path` (which starts with `/`).
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Typed client pointed at this server.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&format!("{}/", self.base_url)).unwrap()
    }

    /// Register a `user` account and return its token and profile.
    pub async fn register(&self, email: &str) -> AuthResponse {
        self.client()
            .register(&register_request(email))
            .await
            .unwrap()
    }

    /// Bearer token of the seeded admin.
    pub async fn admin_token(&self) -> String {
        self.client()
            .login(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap()
            .token
    }

    /// A token for `user` that expired five minutes ago.
    #[must_use]
    pub fn expired_token(&self, user: &UserRecord) -> String {
        SessionTokens::with_ttl(&SecretString::from(JWT_SECRET), Duration::minutes(-5))
            .issue(user)
            .unwrap()
    }

    /// Place a one-item order for `user_id` and return the JSON body.
    pub async fn place_order(&self, token: &str, user_id: UserId) -> Value {
        let resp = self
            .http
            .post(self.url("/api/orders"))
            .bearer_auth(token)
            .json(&order_json(user_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }
}

#[must_use]
pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        full_name: "Nguyen Van A".to_owned(),
        email: email.to_owned(),
        phone: "0901234567".to_owned(),
        password: PASSWORD.to_owned(),
    }
}

/// Two watches, total 500000.
#[must_use]
pub fn order_request(user_id: UserId) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id,
        items: vec![
            LineItem {
                product_id: "rolex-sub".to_owned(),
                name: "Submariner".to_owned(),
                brand: "Rolex".to_owned(),
                price: Decimal::from(200_000),
                quantity: 2,
                image_url: String::new(),
            },
            LineItem {
                product_id: "casio-f91w".to_owned(),
                name: "F-91W".to_owned(),
                brand: "Casio".to_owned(),
                price: Decimal::from(100_000),
                quantity: 1,
                image_url: String::new(),
            },
        ],
        total: Decimal::from(500_000),
        shipping_address: "1 Le Loi, District 1".to_owned(),
        phone: "0901234567".to_owned(),
        payment_method: None,
    }
}

#[must_use]
pub fn order_json(user_id: UserId) -> Value {
    serde_json::to_value(order_request(user_id)).unwrap()
}

/// Claims of a valid Google ID token for this server's client id.
#[must_use]
pub fn google_claims(sub: &str, email: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": "accounts.google.com",
        "aud": GOOGLE_CLIENT_ID,
        "sub": sub,
        "email": email,
        "email_verified": true,
        "name": "Google Shopper",
        "picture": "https://lh3.googleusercontent.com/a/shopper.jpg",
        "iat": now,
        "exp": now + 3600,
    })
}

/// Sign `claims` with the fixture key the server trusts.
#[must_use]
pub fn sign_google(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(GOOGLE_KID.to_owned());
    let key = EncodingKey::from_rsa_pem(GOOGLE_KEY_PEM).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

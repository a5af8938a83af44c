//! Integration tests for the client crate against a live server.

#![allow(clippy::unwrap_used)]

use watch_shop_client::{
    AccountRepository, ApiClient, ClientError, FallbackAccounts, LocalAccounts, RemoteAccounts,
    SeedAccount, Session, SessionCache,
};
use watch_shop_core::{OrderStatus, Role};
use watch_shop_integration_tests::{PASSWORD, TestServer, order_request, register_request};

/// Nothing listens on port 1.
const DEAD_SERVER: &str = "http://127.0.0.1:1/";

#[tokio::test]
async fn test_typed_client_order_flow() {
    let server = TestServer::spawn().await;
    let api = server.client();

    let auth = api.register(&register_request("typed@test.com")).await.unwrap();
    let me = api.me(&auth.token).await.unwrap();
    assert_eq!(me.id, auth.user.id);

    let req = order_request(auth.user.id);
    let placed = api
        .create_order(&auth.token, &req, Some("cart-7"))
        .await
        .unwrap();
    assert!(!placed.replayed);
    assert_eq!(placed.order.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.order.total, req.total);

    let replay = api
        .create_order(&auth.token, &req, Some("cart-7"))
        .await
        .unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.order.order.id, placed.order.order.id);

    let cancelled = api
        .cancel(&auth.token, placed.order.order.id, Some("Too expensive"))
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(
        cancelled.order.cancellation_reason.as_deref(),
        Some("Too expensive")
    );

    let mine = api.orders_for_user(&auth.token, auth.user.id).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn test_typed_client_admin_calls() {
    let server = TestServer::spawn().await;
    let api = server.client();
    let auth = server.register("buyer@test.com").await;
    let placed = api
        .create_order(&auth.token, &order_request(auth.user.id), None)
        .await
        .unwrap();

    let err = api.all_orders(&auth.token).await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    let admin = server.admin_token().await;
    let all = api.all_orders(&admin).await.unwrap();
    assert_eq!(all.len(), 1);

    let updated = api
        .update_status(&admin, placed.order.order.id, "processing")
        .await
        .unwrap();
    assert_eq!(updated.order.status, OrderStatus::Processing);

    let fetched = api.order(&auth.token, placed.order.order.id).await.unwrap();
    assert_eq!(fetched.order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_api_errors_carry_status_and_message() {
    let server = TestServer::spawn().await;
    server.register("taken@test.com").await;
    let api = server.client();

    let err = api
        .register(&register_request("taken@test.com"))
        .await
        .unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "Email already exists");
        }
        other => panic!("expected API error, got {other:?}"),
    }

    let err = api.login("taken@test.com", "wrong-pass").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!err.is_unreachable());
}

#[tokio::test]
async fn test_session_cache_holds_remote_token() {
    let server = TestServer::spawn().await;
    let remote = RemoteAccounts::new(server.client());
    let cache = SessionCache::in_memory();

    let session = remote
        .register(&register_request("cached@test.com"))
        .await
        .unwrap();
    assert!(!session.offline);
    cache.sign_in(session).await.unwrap();

    let token = cache.token().await.unwrap();
    let me = remote.api().me(&token).await.unwrap();
    assert_eq!(me.email.as_str(), "cached@test.com");

    cache.sign_out().await.unwrap();
    assert!(cache.token().await.is_none());
}

#[tokio::test]
async fn test_fallback_prefers_live_server() {
    let server = TestServer::spawn().await;
    server.register("online@test.com").await;

    let repo = FallbackAccounts::new(RemoteAccounts::new(server.client()), LocalAccounts::in_memory());
    let session = repo.login("online@test.com", PASSWORD).await.unwrap();

    assert!(!session.offline);
    assert!(session.token.is_some());
}

#[tokio::test]
async fn test_fallback_never_uses_local_on_api_error() {
    let server = TestServer::spawn().await;
    let local = LocalAccounts::in_memory();
    local
        .seed(&[SeedAccount {
            full_name: "Local Only".to_owned(),
            email: "local-only@test.com".to_owned(),
            phone: String::new(),
            password: PASSWORD.to_owned(),
            role: Role::User,
        }])
        .await
        .unwrap();

    // The account exists locally but the server rejects it.
    let repo = FallbackAccounts::new(RemoteAccounts::new(server.client()), local);
    let err = repo.login("local-only@test.com", PASSWORD).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_fallback_signs_in_offline_when_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalAccounts::open(dir.path().join("accounts.json"))
        .await
        .unwrap();
    let repo = FallbackAccounts::new(
        RemoteAccounts::new(ApiClient::new(DEAD_SERVER).unwrap()),
        local,
    );

    let registered = repo
        .register(&register_request("offline@test.com"))
        .await
        .unwrap();
    assert!(registered.offline);
    assert!(registered.token.is_none());

    let session: Session = repo.login("offline@test.com", PASSWORD).await.unwrap();
    assert_eq!(session.user.id, registered.user.id);

    let cache = SessionCache::in_memory();
    cache.sign_in(session).await.unwrap();
    assert!(cache.token().await.is_none());
}

#[tokio::test]
async fn test_local_accounts_never_reach_server() {
    let server = TestServer::spawn().await;
    let repo = FallbackAccounts::new(
        RemoteAccounts::new(ApiClient::new(DEAD_SERVER).unwrap()),
        LocalAccounts::in_memory(),
    );
    repo.register(&register_request("offline@test.com"))
        .await
        .unwrap();

    let err = server
        .client()
        .login("offline@test.com", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

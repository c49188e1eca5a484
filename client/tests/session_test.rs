//! Session lifecycle and token-refresh integration tests.

mod common;

use common::TestApi;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use timekeeper_client::auth::models::TokenPair;
use timekeeper_client::auth::service::SessionService;
use timekeeper_client::auth::store::{MemoryTokenStore, TokenStore};
use timekeeper_client::errors::ServiceError;
use timekeeper_client::http::ApiClient;

const STAFF_UUID: &str = "abcd1234-ab12-cd34-ef56-1234567890ab";

fn user_payload() -> serde_json::Value {
    json!({
        "id": 1,
        "username": "pat",
        "email": "pat@example.com",
        "profile": {"role": "staff", "staff_uuid": STAFF_UUID}
    })
}

fn session_against(api: &TestApi) -> (Arc<MemoryTokenStore>, Arc<ApiClient>, SessionService) {
    let store = Arc::new(MemoryTokenStore::new());
    let client = Arc::new(ApiClient::new(api.base_url.clone(), store.clone()).unwrap());
    let session = SessionService::new(client.clone());
    (store, client, session)
}

#[tokio::test]
async fn login_stores_tokens_and_loads_profile() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/auth/jwt/create/") => (200, json!({"access": "acc-1", "refresh": "ref-1"})),
        ("GET", "/auth/users/me/") => (200, user_payload()),
        _ => (404, json!({})),
    })
    .await;

    let (store, _, session) = session_against(&api);
    let tokens = session.login("pat", "hunter22").await.unwrap();
    assert_eq!(tokens.access, "acc-1");

    assert!(session.is_authenticated().await);
    assert_eq!(session.staff_uuid().await.as_deref(), Some(STAFF_UUID));
    assert_eq!(
        store.load().await.unwrap(),
        Some(TokenPair {
            access: "acc-1".into(),
            refresh: "ref-1".into()
        })
    );

    // Profile fetch carried the freshly issued token
    let me = api
        .requests()
        .into_iter()
        .find(|r| r.path == "/auth/users/me/")
        .unwrap();
    assert_eq!(me.authorization.as_deref(), Some("JWT acc-1"));
}

#[tokio::test]
async fn failed_login_leaves_no_tokens() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/auth/jwt/create/") => {
            (401, json!({"detail": "No active account found"}))
        }
        _ => (404, json!({})),
    })
    .await;

    let (store, _, session) = session_against(&api);
    let err = session.login("pat", "wrong").await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized { .. }));

    assert!(!session.is_authenticated().await);
    assert!(store.load().await.unwrap().is_none());
    assert!(session.user().await.is_none());
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_replayed_once() {
    let me_calls = Arc::new(AtomicUsize::new(0));
    let counter = me_calls.clone();
    let api = TestApi::spawn(move |request| {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/auth/users/me/") => {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (401, json!({"detail": "token expired"}))
                } else {
                    (200, user_payload())
                }
            }
            ("POST", "/auth/jwt/refresh/") => {
                assert_eq!(request.body["refresh"], json!("ref-1"));
                (200, json!({"access": "fresh"}))
            }
            _ => (404, json!({})),
        }
    })
    .await;

    let (store, client, session) = session_against(&api);
    client
        .set_tokens(TokenPair {
            access: "stale".into(),
            refresh: "ref-1".into(),
        })
        .await
        .unwrap();

    let user = session.fetch_user().await.unwrap();
    assert_eq!(user.username.as_deref(), Some("pat"));

    // Exactly one refresh, one replay
    assert_eq!(
        api.request_lines(),
        vec![
            "GET /auth/users/me/",
            "POST /auth/jwt/refresh/",
            "GET /auth/users/me/",
        ]
    );
    let replay = api.requests().into_iter().last().unwrap();
    assert_eq!(replay.authorization.as_deref(), Some("JWT fresh"));

    // Refresh token is kept alongside the new access token
    assert_eq!(
        store.load().await.unwrap(),
        Some(TokenPair {
            access: "fresh".into(),
            refresh: "ref-1".into()
        })
    );
}

#[tokio::test]
async fn failed_refresh_clears_auth_and_signals_logout() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/auth/users/me/") => (401, json!({"detail": "token expired"})),
        ("POST", "/auth/jwt/refresh/") => (401, json!({"detail": "refresh expired"})),
        _ => (404, json!({})),
    })
    .await;

    let (store, client, session) = session_against(&api);
    client
        .set_tokens(TokenPair {
            access: "stale".into(),
            refresh: "dead".into(),
        })
        .await
        .unwrap();
    let forced_logout = client.forced_logout();

    let err = session.fetch_user().await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionExpired));

    // One refresh attempt, no replay afterwards
    assert_eq!(
        api.request_lines(),
        vec!["GET /auth/users/me/", "POST /auth/jwt/refresh/"]
    );
    assert!(!session.is_authenticated().await);
    assert!(store.load().await.unwrap().is_none());
    assert!(*forced_logout.borrow());
}

#[tokio::test]
async fn register_creates_account_then_logs_in() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/auth/users/") => (201, json!({"id": 7, "username": "new"})),
        ("POST", "/auth/jwt/create/") => (200, json!({"access": "acc-7", "refresh": "ref-7"})),
        ("GET", "/auth/users/me/") => (200, user_payload()),
        _ => (404, json!({})),
    })
    .await;

    let (_, _, session) = session_against(&api);
    let payload = session
        .register("new", "new@example.com", "hunter2222")
        .await
        .unwrap();
    assert_eq!(payload["id"], json!(7));

    assert!(session.is_authenticated().await);
    assert_eq!(
        api.request_lines(),
        vec![
            "POST /auth/users/",
            "POST /auth/jwt/create/",
            "GET /auth/users/me/",
        ]
    );
}

#[tokio::test]
async fn registration_is_not_rolled_back_when_login_fails() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/auth/users/") => (201, json!({"id": 8})),
        ("POST", "/auth/jwt/create/") => (401, json!({"detail": "nope"})),
        _ => (404, json!({})),
    })
    .await;

    let (store, _, session) = session_against(&api);
    let err = session
        .register("new", "new@example.com", "hunter2222")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized { .. }));

    // The account was created; only the login leg failed
    assert_eq!(
        api.request_lines(),
        vec!["POST /auth/users/", "POST /auth/jwt/create/"]
    );
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn initialize_without_stored_tokens_is_a_noop() {
    let api = TestApi::spawn(|_| (500, json!({}))).await;
    let (_, _, session) = session_against(&api);

    assert!(session.initialize().await.unwrap().is_none());
    assert!(api.request_lines().is_empty());
    assert!(!session.is_authenticated().await);
}

#[tokio::test]
async fn initialize_restores_session_from_stored_tokens() {
    let api = TestApi::spawn(|request| match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/auth/users/me/") => (200, user_payload()),
        _ => (404, json!({})),
    })
    .await;

    let store = Arc::new(MemoryTokenStore::new());
    store
        .save(&TokenPair {
            access: "acc-1".into(),
            refresh: "ref-1".into(),
        })
        .await
        .unwrap();
    let client = Arc::new(ApiClient::new(api.base_url.clone(), store).unwrap());
    let session = SessionService::new(client);

    let user = session.initialize().await.unwrap().unwrap();
    assert_eq!(user.staff_uuid(), Some(STAFF_UUID));
    assert!(session.is_authenticated().await);
}

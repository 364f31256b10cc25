// Integration tests for the Salvage client
//
// These tests verify the session lifecycle end to end against a mock
// backend: bearer attachment, 401-triggered renewal with a single replay,
// single-flight de-duplication, and guard evaluation.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use mockito::Matcher;
use serde_json::json;

use salvage_client::api::SalvageApi;
use salvage_client::auth::{
    Credentials, MemoryTokenStore, SessionGuard, SessionState, TokenPair, TokenStore,
};
use salvage_client::error::ApiError;

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Forge an unsigned access token expiring `offset_secs` from now
fn forge_token(offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(
        r#"{{"exp":{}}}"#,
        Utc::now().timestamp() + offset_secs
    ));
    format!("{}.{}.forged-signature", header, payload)
}

fn seeded_store(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .set(&TokenPair {
            access: access.to_string(),
            refresh: refresh.to_string(),
        })
        .unwrap();
    store
}

fn api_for(server: &mockito::Server, store: Arc<MemoryTokenStore>) -> SalvageApi {
    SalvageApi::new(&server.url(), store, 10, 30).unwrap()
}

fn bearer(token: &str) -> Matcher {
    Matcher::Exact(format!("Bearer {}", token))
}

// ==================================================================================================
// Bearer Attachment
// ==================================================================================================

#[tokio::test]
async fn test_requests_carry_stored_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a1"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("a1", "r1");
    let api = api_for(&server, store);

    let files = api.list_files().await.unwrap();
    assert!(files.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_requests_without_session_are_unmodified() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/files/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::new()));

    let files = api.list_files().await.unwrap();
    assert!(files.is_empty());
    mock.assert_async().await;
}

// ==================================================================================================
// Renewal and Replay
// ==================================================================================================

#[tokio::test]
async fn test_401_triggers_one_refresh_and_one_replay() {
    let mut server = mockito::Server::new_async().await;

    let stale = server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a1"))
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .match_body(Matcher::Json(json!({"refresh": "r1"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access": "a2"}"#)
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a2"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1, "name": "list.c", "c_code": "", "rust_code": ""}]"#)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("a1", "r1");
    let api = api_for(&server, store.clone());

    let files = api.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "list.c");

    // The refresh credential is untouched by the renewal
    assert_eq!(
        store.get(),
        Some(TokenPair {
            access: "a2".to_string(),
            refresh: "r1".to_string(),
        })
    );

    stale.assert_async().await;
    refresh.assert_async().await;
    replay.assert_async().await;
}

#[tokio::test]
async fn test_second_401_surfaces_auth_failure() {
    let mut server = mockito::Server::new_async().await;

    // Unauthorized no matter which bearer arrives
    let files = server
        .mock("GET", "/api/files/")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access": "a2"}"#)
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, seeded_store("a1", "r1"));

    let err = api.list_files().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthExpired));

    // Exactly one refresh, exactly one replay, no loop
    files.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_refresh_failure_is_terminal() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/api/files/")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/api/token/refresh/")
        .with_status(401)
        .with_body(r#"{"detail": "Token is invalid or expired"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("a1", "r1");
    let api = api_for(&server, store.clone());

    let err = api.list_files().await.unwrap_err();
    assert!(matches!(err, ApiError::RefreshFailed(_)));
    assert!(err.requires_login());

    // Session is gone and the next guard evaluation says so
    assert!(store.get().is_none());
    let guard = SessionGuard::new(store);
    assert_eq!(guard.evaluate(), SessionState::Unauthorized);
}

#[tokio::test]
async fn test_request_after_failed_refresh_has_no_bearer() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a1"))
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/api/token/refresh/")
        .with_status(500)
        .create_async()
        .await;
    let bare = server
        .mock("GET", "/api/files/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let store = seeded_store("a1", "r1");
    let api = api_for(&server, store);

    assert!(api.list_files().await.is_err());

    // The cleared session means the next attempt attaches no bearer header
    let files = api.list_files().await.unwrap();
    assert!(files.is_empty());
    bare.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a1"))
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/transpiler/transpile/")
        .match_header("authorization", bearer("a1"))
        .with_status(401)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access": "a2"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/api/files/")
        .match_header("authorization", bearer("a2"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("POST", "/transpiler/transpile/")
        .match_header("authorization", bearer("a2"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"rust_code": "fn main() {}"}"#)
        .create_async()
        .await;

    let api = api_for(&server, seeded_store("a1", "r1"));

    let (files, rust_code) = tokio::join!(api.list_files(), api.transpile("int main() {}"));
    assert!(files.unwrap().is_empty());
    assert_eq!(rust_code.unwrap(), "fn main() {}");

    // Both 401s were served by a single refresh exchange
    refresh.assert_async().await;
}

// ==================================================================================================
// Login, Signup, Guard
// ==================================================================================================

#[tokio::test]
async fn test_login_roundtrip_authorizes_guard() {
    let mut server = mockito::Server::new_async().await;
    let access = forge_token(600);

    server
        .mock("POST", "/api/token/")
        .match_body(Matcher::Json(json!({
            "username": "ada",
            "password": "hunter2",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"access": access.clone(), "refresh": "r1"}).to_string())
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let api = api_for(&server, store.clone());

    api.login(&Credentials {
        username: "ada".to_string(),
        password: "hunter2".to_string(),
    })
    .await
    .unwrap();

    assert_eq!(
        store.get(),
        Some(TokenPair {
            access,
            refresh: "r1".to_string(),
        })
    );

    let guard = SessionGuard::new(store);
    assert_eq!(guard.evaluate(), SessionState::Authorized);
}

#[tokio::test]
async fn test_rejected_login_is_invalid_credentials() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/token/")
        .with_status(401)
        .with_body(r#"{"detail": "No active account found with the given credentials"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let api = api_for(&server, store.clone());

    let err = api
        .login(&Credentials {
            username: "ada".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        ApiError::InvalidCredentials(detail) => {
            assert_eq!(detail, "No active account found with the given credentials");
        }
        other => panic!("expected InvalidCredentials, got {:?}", other),
    }
    assert!(store.get().is_none());
}

#[tokio::test]
async fn test_expired_token_unauthorized_without_network() {
    let mut server = mockito::Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .expect(0)
        .create_async()
        .await;

    let store = seeded_store(&forge_token(-1), "r1");
    let guard = SessionGuard::new(store.clone());

    assert_eq!(guard.evaluate(), SessionState::Unauthorized);
    // The expired pair is discarded, and no renewal was attempted
    assert!(store.get().is_none());
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_signup_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/signup/")
        .match_body(Matcher::Json(json!({
            "username": "ada",
            "password": "hunter2",
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": "User created successfully"}"#)
        .create_async()
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::new()));

    api.signup(&Credentials {
        username: "ada".to_string(),
        password: "hunter2".to_string(),
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_rejected_signup_carries_backend_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/signup/")
        .with_status(400)
        .with_body(r#"{"error": "Registration failed"}"#)
        .create_async()
        .await;

    let api = api_for(&server, Arc::new(MemoryTokenStore::new()));

    let err = api
        .signup(&Credentials {
            username: "ada".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials(_)));
}

// ==================================================================================================
// File and Transpile Operations
// ==================================================================================================

#[tokio::test]
async fn test_save_and_delete_file() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/files/")
        .match_header("authorization", bearer("a1"))
        .match_body(Matcher::Json(json!({
            "name": "list.c",
            "c_code": "int main() { return 0; }",
            "rust_code": "",
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id": 7, "user": 3, "name": "list.c",
                "c_code": "int main() { return 0; }", "rust_code": "",
                "created_at": "2025-03-14T09:26:53Z"}"#,
        )
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/files/7/")
        .match_header("authorization", bearer("a1"))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, seeded_store("a1", "r1"));

    let stored = api
        .save_file(&salvage_client::models::NewFile {
            name: "list.c".to_string(),
            c_code: "int main() { return 0; }".to_string(),
            rust_code: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(stored.id, 7);

    api.delete_file(stored.id).await.unwrap();
    delete.assert_async().await;
}

#[tokio::test]
async fn test_non_401_errors_pass_through() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/files/")
        .with_status(503)
        .with_body("upstream down")
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token/refresh/")
        .expect(0)
        .create_async()
        .await;

    let api = api_for(&server, seeded_store("a1", "r1"));

    let err = api.list_files().await.unwrap_err();
    match err {
        ApiError::Backend { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream down");
        }
        other => panic!("expected Backend error, got {:?}", other),
    }
    // Only 401 engages the renewal path
    refresh.assert_async().await;
}

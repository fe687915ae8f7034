//! End-to-end register / authenticate / logout behavior over HTTP.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use common::{spawn_server, spawn_with, test_config};
use task_tracker::auth::credentials::{MemoryUserDirectory, UserDirectory};
use task_tracker::config::AppConfig;
use task_tracker::store::{
    BucketPolicy, BucketStore, ConsumeOutcome, MemoryStore, RevocationStore, SharedStores,
    StoreError,
};

/// Rate limiting is covered in its own suite; keep it out of the way here.
fn auth_config() -> AppConfig {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    config
}

#[tokio::test]
async fn test_register_then_access_tasks() {
    let server = spawn_server(auth_config()).await;
    let token = server.register_token("alice@example.com", "secret-pw").await;

    let res = server.get_authed("/tasks", &token).await;
    assert_eq!(res.status(), 200);
    let tasks: Vec<Value> = res.json().await.unwrap();
    assert!(tasks.is_empty());

    let res = server
        .client
        .post(server.url("/tasks"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Write report", "priority": "HIGH" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["title"], "Write report");
    assert_eq!(created["priority"], "HIGH");
    assert_eq!(created["completed"], false);

    let tasks: Vec<Value> = server
        .get_authed("/tasks", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let server = spawn_server(auth_config()).await;

    let res = server.client.get(server.url("/tasks")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["path"], "/tasks");
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_garbage_token_is_anonymous() {
    let server = spawn_server(auth_config()).await;

    let res = server.get_authed("/tasks", "not.a.token").await;
    assert_eq!(res.status(), 401);

    // Public routes ignore a bad token.
    let res = server
        .client
        .get(server.url("/health"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let server = spawn_server(auth_config()).await;
    server.register_token("bob@example.com", "secret-pw").await;

    let res = server.register("BOB@example.com", "other-pw").await;
    assert_eq!(res.status(), 409);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 409);
    assert_eq!(body["path"], "/auth/register");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("bob@example.com"));
}

#[tokio::test]
async fn test_bad_credentials_are_indistinguishable() {
    let server = spawn_server(auth_config()).await;
    server.register_token("carol@example.com", "secret-pw").await;

    let wrong_password = server.authenticate("carol@example.com", "wrong-pw").await;
    assert_eq!(wrong_password.status(), 401);
    let wrong_password: Value = wrong_password.json().await.unwrap();

    let unknown = server.authenticate("nobody@example.com", "secret-pw").await;
    assert_eq!(unknown.status(), 401);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong_password["message"], unknown["message"]);
    assert_eq!(wrong_password["message"], "Invalid username or password.");

    let ok = server.authenticate("carol@example.com", "secret-pw").await;
    assert_eq!(ok.status(), 200);
}

#[tokio::test]
async fn test_logout_revokes_only_that_token() {
    let server = spawn_server(auth_config()).await;
    let token = server.register_token("dave@example.com", "secret-pw").await;
    assert_eq!(server.get_authed("/tasks", &token).await.status(), 200);

    let res = server.logout(&token).await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Logout successful");
    assert_eq!(body["status"], "200");

    assert_eq!(server.get_authed("/tasks", &token).await.status(), 401);

    // A fresh login, even within the same second, is unaffected.
    let res = server.authenticate("dave@example.com", "secret-pw").await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let fresh = body["token"].as_str().unwrap();
    assert_ne!(fresh, token);
    assert_eq!(server.get_authed("/tasks", fresh).await.status(), 200);
}

#[tokio::test]
async fn test_logout_requires_bearer_token() {
    let server = spawn_server(auth_config()).await;

    let res = server
        .client
        .post(server.url("/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = server.logout("forged.token.value").await;
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn test_logout_not_mounted_without_revocation() {
    let mut config = auth_config();
    config.revocation.enabled = false;
    let server = spawn_with(config, Arc::new(MemoryUserDirectory::new()), None).await;

    let token = server.register_token("erin@example.com", "secret-pw").await;
    let res = server.logout(&token).await;
    assert_eq!(res.status(), 404);

    assert_eq!(server.get_authed("/tasks", &token).await.status(), 200);
}

#[tokio::test]
async fn test_revocation_visible_to_every_instance() {
    let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
    let stores = SharedStores::single(Arc::new(MemoryStore::new()));
    let a = spawn_with(auth_config(), users.clone(), Some(stores.clone())).await;
    let b = spawn_with(auth_config(), users, Some(stores)).await;

    let token = a.register_token("frank@example.com", "secret-pw").await;
    assert_eq!(b.get_authed("/tasks", &token).await.status(), 200);

    assert_eq!(a.logout(&token).await.status(), 200);
    assert_eq!(b.get_authed("/tasks", &token).await.status(), 401);
}

#[tokio::test]
async fn test_invalid_bodies_rejected() {
    let server = spawn_server(auth_config()).await;

    let res = server.register("not-an-email", "secret-pw").await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 400);

    let res = server.register("grace@example.com", "123").await;
    assert_eq!(res.status(), 400);

    let res = server
        .client
        .post(server.url("/auth/authenticate"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/auth/authenticate");
}

#[tokio::test]
async fn test_tasks_scoped_to_owner() {
    let server = spawn_server(auth_config()).await;
    let alice = server.register_token("heidi@example.com", "secret-pw").await;
    let bob = server.register_token("ivan@example.com", "secret-pw").await;

    let created: Value = server
        .client
        .post(server.url("/tasks"))
        .bearer_auth(&alice)
        .json(&json!({ "title": "Private" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path = format!("/tasks/{}", created["id"].as_str().unwrap());

    assert_eq!(server.get_authed(&path, &bob).await.status(), 404);
    assert_eq!(server.get_authed(&path, &alice).await.status(), 200);

    let res = server
        .client
        .put(server.url(&path))
        .bearer_auth(&alice)
        .json(&json!({ "completed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["completed"], true);

    let res = server
        .client
        .delete(server.url(&path))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    assert_eq!(server.get_authed(&path, &alice).await.status(), 404);
}

#[tokio::test]
async fn test_admin_routes_require_authority() {
    let mut config = auth_config();
    config.admin.email = Some("root@example.com".into());
    config.admin.password = Some("root-password".into());
    let server = spawn_server(config).await;

    let res = server
        .client
        .get(server.url("/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let user = server.register_token("judy@example.com", "secret-pw").await;
    assert_eq!(server.get_authed("/admin/status", &user).await.status(), 403);

    let res = server.authenticate("root@example.com", "root-password").await;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    let admin = body["token"].as_str().unwrap();

    let res = server.get_authed("/admin/status", admin).await;
    assert_eq!(res.status(), 200);
    let status: Value = res.json().await.unwrap();
    assert_eq!(status["revocationEnabled"], true);
    assert_eq!(status["registeredUsers"], 2);

    let me: Value = server
        .get_authed("/admin/users/me", admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], "root@example.com");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let server = spawn_server(auth_config()).await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));

    let res = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");
}

/// A store whose every call fails.
struct UnreachableStore;

#[async_trait]
impl RevocationStore for UnreachableStore {
    async fn revoke(&self, _token: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Protocol("connection refused".into()))
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, StoreError> {
        Err(StoreError::Protocol("connection refused".into()))
    }
}

#[async_trait]
impl BucketStore for UnreachableStore {
    async fn try_consume(
        &self,
        _key: &str,
        _policy: &BucketPolicy,
        _now_ms: i64,
    ) -> Result<ConsumeOutcome, StoreError> {
        Err(StoreError::Protocol("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let stores = SharedStores::single(Arc::new(UnreachableStore));
    let server = spawn_with(
        auth_config(),
        Arc::new(MemoryUserDirectory::new()),
        Some(stores),
    )
    .await;

    // Registration never consults the revocation store.
    let token = server.register_token("ken@example.com", "secret-pw").await;

    let res = server.get_authed("/tasks", &token).await;
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["statusCode"], 503);

    assert_eq!(server.logout(&token).await.status(), 503);
}

#[tokio::test]
async fn test_rate_limiter_outage_fails_closed() {
    let mut config = test_config();
    config.revocation.enabled = false;
    let stores = SharedStores::single(Arc::new(UnreachableStore));
    let server = spawn_with(config, Arc::new(MemoryUserDirectory::new()), Some(stores)).await;

    let res = server.authenticate("lee@example.com", "secret-pw").await;
    assert_eq!(res.status(), 503);

    // Outside the limiter's scope nothing touches the store.
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_rate_limit_gate_runs_before_authentication() {
    let stores = SharedStores {
        revocation: Arc::new(UnreachableStore),
        buckets: Arc::new(MemoryStore::new()),
    };
    let server = spawn_with(
        test_config(),
        Arc::new(MemoryUserDirectory::new()),
        Some(stores),
    )
    .await;
    let token = server.register_token("mia@example.com", "secret-pw").await;

    let authenticate = || {
        server
            .client
            .post(server.url("/auth/authenticate"))
            .bearer_auth(&token)
            .header("x-forwarded-for", "203.0.113.50")
            .json(&json!({ "email": "mia@example.com", "password": "secret-pw" }))
            .send()
    };

    // Within budget, the bearer token reaches the unreachable revocation store.
    for _ in 0..10 {
        assert_eq!(authenticate().await.unwrap().status(), 503);
    }

    // Over budget, the limiter answers before any store lookup.
    let res = authenticate().await.unwrap();
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_cors_preflight_bypasses_gates() {
    let server = spawn_server(test_config()).await;

    let res = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/tasks"))
        .header("origin", "http://localhost:4200")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "authorization")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:4200"
    );
    let methods = res.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("DELETE"));

    // Unknown origins get an answer but no grant.
    let res = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/tasks"))
        .header("origin", "https://evil.example.com")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert!(!res.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_headers_on_actual_requests() {
    let mut config = auth_config();
    config.cors.allowed_origins = vec!["https://app.example.com".into()];
    let server = spawn_server(config).await;

    let res = server
        .client
        .get(server.url("/health"))
        .header("origin", "https://app.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "https://app.example.com"
    );

    // Rejections from the gates still carry the grant so browsers can read them.
    let res = server
        .client
        .get(server.url("/tasks"))
        .header("origin", "https://app.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "https://app.example.com"
    );
}

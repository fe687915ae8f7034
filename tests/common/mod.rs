//! Shared utilities for integration tests.
//!
//! Each test runs the real server on an ephemeral port and drives it over HTTP
//! with reqwest.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use task_tracker::auth::credentials::{Argon2Encoder, MemoryUserDirectory, UserDirectory};
use task_tracker::config::schema::{AppConfig, PasswordHashingConfig, StoreBackend};
use task_tracker::http::HttpServer;
use task_tracker::lifecycle::{assemble, Shutdown};
use task_tracker::store::{MemoryStore, SharedStores};

/// Base64 of a 32-byte key.
pub const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Memory backend, cheap hashing, no metrics exporter.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.jwt.secret_key = SECRET.into();
    config.store.backend = StoreBackend::Memory;
    config.observability.metrics_enabled = false;
    config.password_hashing = PasswordHashingConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({
                "firstName": "Test",
                "lastName": "User",
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("server unreachable")
    }

    /// Register and return the token, panicking on failure.
    pub async fn register_token(&self, email: &str, password: &str) -> String {
        let res = self.register(email, password).await;
        assert_eq!(res.status(), 200, "registration failed");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/authenticate"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("server unreachable")
    }

    pub async fn logout(&self, token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .send()
            .await
            .expect("server unreachable")
    }

    pub async fn get_authed(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("server unreachable")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server with its own in-memory store and directory.
pub async fn spawn_server(config: AppConfig) -> TestServer {
    let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
    let stores = SharedStores::single(Arc::new(MemoryStore::new()));
    spawn_with(config, users, Some(stores)).await
}

/// Start a server on explicit collaborators, so several instances can share
/// one store and one user directory.
pub async fn spawn_with(
    config: AppConfig,
    users: Arc<dyn UserDirectory>,
    stores: Option<SharedStores>,
) -> TestServer {
    let encoder = Arc::new(Argon2Encoder::new(&config.password_hashing).unwrap());
    let state = assemble(config, users, encoder, stores)
        .await
        .expect("state assembly failed");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        client,
        shutdown,
    }
}

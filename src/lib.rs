//! Multi-tenant task tracker with a distributed security perimeter.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::server (request id, trace, metrics, error bodies)
//!                          │
//!                          ▼
//!                      security::rate_limit ──────────┐
//!                          │                          │
//!                          ▼                          ▼
//!                      security::authentication ─▶ store (Redis / memory)
//!                          │        │                 ▲
//!                          │        └─ auth::token    │
//!                          ▼                          │
//!                      security::access_control       │
//!                          │                          │
//!                          ▼                          │
//!          ┌───────────────┼───────────────┐          │
//!          ▼               ▼               ▼          │
//!      auth::handlers  tasks::handlers  admin         │
//!          │                                          │
//!          └─ auth::session (register/login/logout) ──┘
//! ```
//!
//! Revocation markers and rate-limit buckets live only in the shared store, so
//! any number of instances behave as one.

// Core subsystems
pub mod auth;
pub mod config;
pub mod http;
pub mod store;

// Application features
pub mod admin;
pub mod tasks;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware pipeline)
//!     → cors.rs (preflight answers, allow-origin headers)
//!     → request.rs (request ID, JSON body decoding)
//!     → [security gates, handlers]
//!     → response.rs (error mapping, structured error body)
//!     → Send to client
//! ```

pub mod cors;
pub mod request;
pub mod response;
pub mod server;

pub use request::{JsonBody, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};

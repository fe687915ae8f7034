//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Startup connection to the shared store:
//!     → retries.rs (bounded attempts)
//!     → backoff.rs (exponential delay + jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Only startup is retried; request-path store calls fail fast with a deadline
//! - Jittered backoff prevents thundering herd when a fleet restarts together

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{retry_with_backoff, RetryPolicy};

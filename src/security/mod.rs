//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client token bucket in the shared store)
//!     → authentication.rs (bearer token → SecurityContext)
//!         → revocation.rs (shared logout blacklist)
//!     → access_control.rs (public vs protected routes, authorities)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before authentication: anonymous requests spend quota
//! - Optional features are explicit `Enabled`/`Disabled` values chosen at startup
//! - Fail closed: a shared store failure on an enabled feature answers 503
//! - No trust in client input

pub mod access_control;
pub mod authentication;
pub mod rate_limit;
pub mod revocation;

pub use access_control::{CurrentUser, RoutePolicy};
pub use authentication::{AnonymousReason, Authenticator, SecurityContext};
pub use rate_limit::RateLimiter;
pub use revocation::Revocation;

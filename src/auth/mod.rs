//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! POST /auth/register | /auth/authenticate
//!     → handlers.rs (decode + validate body)
//!     → session.rs (directory lookup, Argon2 hash/verify)
//!     → token.rs (issue HS256 token)
//!
//! POST /auth/logout
//!     → session.rs (verify signature, compute remaining lifetime)
//!     → security::revocation (write marker to the shared store)
//! ```
//!
//! # Design Decisions
//! - Tokens are stateless; revocation is the only server-side token state
//! - User storage and password hashing sit behind traits (`credentials.rs`)
//! - Unknown identity and wrong password are indistinguishable to callers

pub mod credentials;
pub mod handlers;
pub mod principal;
pub mod session;
pub mod token;

pub use credentials::{Argon2Encoder, MemoryUserDirectory, PasswordEncoder, UserDirectory};
pub use principal::{Permission, Principal, Role};
pub use session::{AuthenticateRequest, LogoutOutcome, RegisterRequest, SessionService};
pub use token::{Claims, TokenCodec};

use crate::store::StoreError;

/// Message shared by every failed login, whatever the cause.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("token revoked")]
    RevokedToken,

    #[error("User with email {0} already exists.")]
    IdentityAlreadyExists(String),

    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid signing key: {0}")]
    Key(String),
}

//! Shared key-value store.
//!
//! # Responsibilities
//! - Hold revocation markers (logout blacklist) with a TTL
//! - Hold per-client rate-limit buckets with atomic read-modify-write
//!
//! # Design Decisions
//! - Two narrow traits instead of a generic KV interface; each gate only sees
//!   the operation it needs
//! - Redis is the production backend; the in-memory backend is only correct
//!   for a single instance and exists for tests and local development
//! - Raw tokens never reach the store: marker keys carry a SHA-256 digest

pub mod bucket;
pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub use bucket::{BucketPolicy, BucketState, ConsumeOutcome};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Key prefix for revocation markers.
pub const REVOCATION_PREFIX: &str = "jwt_blacklist:";

/// Key prefix for per-client rate-limit buckets.
pub const BUCKET_PREFIX: &str = "rate_limit:ip:";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("unexpected store reply: {0}")]
    Protocol(String),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Revoked-token markers.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `token` revoked for `ttl`. Overwrites an existing marker.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;
}

/// Rate-limit buckets.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch-or-create the bucket at `key`, refill it and take one token, as a
    /// single atomic step. `now_ms` is epoch milliseconds.
    async fn try_consume(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<ConsumeOutcome, StoreError>;
}

pub fn revocation_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}{}", REVOCATION_PREFIX, hex::encode(digest))
}

pub fn bucket_key(client: &str) -> String {
    format!("{}{}", BUCKET_PREFIX, client)
}

/// Handles to the shared store, one per concern.
#[derive(Clone)]
pub struct SharedStores {
    pub revocation: Arc<dyn RevocationStore>,
    pub buckets: Arc<dyn BucketStore>,
}

impl SharedStores {
    /// Use one backend for both concerns.
    pub fn single<S>(store: Arc<S>) -> Self
    where
        S: RevocationStore + BucketStore + 'static,
    {
        Self {
            revocation: store.clone(),
            buckets: store,
        }
    }
}

impl std::fmt::Debug for SharedStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStores").finish_non_exhaustive()
    }
}

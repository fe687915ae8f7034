//! Process-local store backed by `DashMap`.
//!
//! Atomicity comes from the per-shard entry lock: the bucket is read, refilled
//! and written while the entry guard is held. Expired entries are treated as
//! absent on access and removed by [`MemoryStore::purge_expired`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::bucket::{BucketPolicy, BucketState, ConsumeOutcome};
use super::{bucket_key, revocation_key, BucketStore, RevocationStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct StoredBucket {
    state: BucketState,
    /// Epoch milliseconds, on the same clock callers pass to `try_consume`.
    expires_at_ms: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    revoked: DashMap<String, Instant>,
    buckets: DashMap<String, StoredBucket>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of the marker for `token`, if any.
    pub fn revocation_ttl(&self, token: &str) -> Option<Duration> {
        let key = revocation_key(token);
        let expires_at = *self.revoked.get(&key)?;
        expires_at.checked_duration_since(Instant::now())
    }

    /// Current state of the bucket for `client`, ignoring expiry.
    pub fn bucket(&self, client: &str) -> Option<BucketState> {
        self.buckets.get(&bucket_key(client)).map(|b| b.state)
    }

    /// Drop expired markers and buckets. Returns how many entries were removed.
    pub fn purge_expired(&self, now_ms: i64) -> usize {
        let now = Instant::now();
        let before = self.revoked.len() + self.buckets.len();
        self.revoked.retain(|_, expires_at| *expires_at > now);
        self.buckets.retain(|_, b| b.expires_at_ms > now_ms);
        before.saturating_sub(self.revoked.len() + self.buckets.len())
    }

    pub fn len(&self) -> usize {
        self.revoked.len() + self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RevocationStore for MemoryStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        self.revoked
            .insert(revocation_key(token), Instant::now() + ttl);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let key = revocation_key(token);
        let live = match self.revoked.get(&key) {
            Some(expires_at) => *expires_at > Instant::now(),
            None => return Ok(false),
        };
        if !live {
            self.revoked.remove_if(&key, |_, expires_at| *expires_at <= Instant::now());
        }
        Ok(live)
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn try_consume(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<ConsumeOutcome, StoreError> {
        let expires_at_ms = now_ms + policy.idle_ttl_ms() as i64;

        let outcome = match self.buckets.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = if entry.get().expires_at_ms > now_ms {
                    entry.get().state
                } else {
                    BucketState::full(policy, now_ms)
                };
                let (outcome, next) = current.try_consume(policy, now_ms);
                if let Some(state) = next {
                    entry.insert(StoredBucket {
                        state,
                        expires_at_ms,
                    });
                }
                outcome
            }
            Entry::Vacant(entry) => {
                let (outcome, next) = BucketState::full(policy, now_ms).try_consume(policy, now_ms);
                if let Some(state) = next {
                    entry.insert(StoredBucket {
                        state,
                        expires_at_ms,
                    });
                }
                outcome
            }
        };
        Ok(outcome)
    }
}

//! Token-bucket arithmetic.
//!
//! Pure state transitions shared by every [`BucketStore`](super::BucketStore)
//! backend. The Redis Lua script in `redis.rs` performs exactly the same
//! integer steps, so both backends agree on every decision.
//!
//! Refill is greedy: tokens trickle in one at a time (`period / refill_tokens`
//! apart) rather than arriving as a block at the end of the period.

use std::time::Duration;

/// Shape of a bucket: burst size, refill rate and idle lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    pub capacity: u64,
    pub refill_tokens: u64,
    pub refill_period: Duration,
    /// Buckets untouched for this long are evicted by the store.
    pub idle_ttl: Duration,
}

impl BucketPolicy {
    pub fn refill_period_ms(&self) -> u64 {
        self.refill_period.as_millis() as u64
    }

    pub fn idle_ttl_ms(&self) -> u64 {
        self.idle_ttl.as_millis() as u64
    }

    /// Milliseconds between two consecutive tokens, rounded up.
    fn token_interval_ms(&self) -> u64 {
        self.refill_period_ms().div_ceil(self.refill_tokens.max(1))
    }
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_tokens: 10,
            refill_period: Duration::from_secs(60),
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

/// Persisted bucket state. `refilled_at` is epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub tokens: u64,
    pub refilled_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Allowed { remaining: u64 },
    Rejected { retry_after: Duration },
}

impl ConsumeOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ConsumeOutcome::Allowed { .. })
    }
}

impl BucketState {
    /// A bucket seen for the first time starts full.
    pub fn full(policy: &BucketPolicy, now_ms: i64) -> Self {
        Self {
            tokens: policy.capacity,
            refilled_at: now_ms,
        }
    }

    fn refilled(mut self, policy: &BucketPolicy, now_ms: i64) -> Self {
        let period_ms = policy.refill_period_ms().max(1) as u128;
        let refill = policy.refill_tokens as u128;

        let elapsed = now_ms - self.refilled_at;
        if elapsed > 0 {
            let added = (elapsed as u128 * refill / period_ms) as u64;
            if added > 0 {
                self.tokens = self.tokens.saturating_add(added).min(policy.capacity);
                self.refilled_at += (added as u128 * period_ms / refill.max(1)) as i64;
            }
        }

        // A full bucket does not bank time toward future tokens.
        if self.tokens >= policy.capacity {
            self.tokens = policy.capacity;
            self.refilled_at = now_ms;
        }
        self
    }

    /// Refill, then try to take one token.
    ///
    /// Returns the decision and, only when a token was taken, the state to
    /// persist. A rejection leaves the stored bucket untouched.
    pub fn try_consume(
        self,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> (ConsumeOutcome, Option<BucketState>) {
        let state = self.refilled(policy, now_ms);

        if state.tokens == 0 {
            let waited = (now_ms - state.refilled_at).max(0) as u64;
            let wait_ms = policy.token_interval_ms().saturating_sub(waited).max(1);
            let outcome = ConsumeOutcome::Rejected {
                retry_after: Duration::from_millis(wait_ms),
            };
            return (outcome, None);
        }

        let next = BucketState {
            tokens: state.tokens - 1,
            refilled_at: state.refilled_at,
        };
        (
            ConsumeOutcome::Allowed {
                remaining: next.tokens,
            },
            Some(next),
        )
    }
}

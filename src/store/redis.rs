//! Redis backend.
//!
//! Every instance of the service talks to the same Redis, which is what makes
//! revocation and rate limiting cluster-wide. Each call goes through a cloned
//! [`ConnectionManager`] (multiplexed, reconnects on its own) and is bounded by
//! the configured operation timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use url::Url;

use super::bucket::{BucketPolicy, ConsumeOutcome};
use super::{revocation_key, BucketStore, RevocationStore, StoreError};
use crate::config::RedisConfig;
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Refill-and-consume as one atomic server-side step. Mirrors
/// `BucketState::try_consume`.
///
/// KEYS[1] bucket key
/// ARGV: capacity, refill_tokens, refill_period_ms, now_ms, idle_ttl_ms
/// Returns {allowed, tokens, retry_after_ms}.
const CONSUME_SCRIPT: &str = r#"
local capacity = tonumber(ARGV[1])
local refill_tokens = tonumber(ARGV[2])
local period_ms = tonumber(ARGV[3])
local now = tonumber(ARGV[4])
local idle_ttl_ms = tonumber(ARGV[5])

local state = redis.call('HMGET', KEYS[1], 'tokens', 'refilled_at')
local tokens = tonumber(state[1])
local refilled_at = tonumber(state[2])
if tokens == nil or refilled_at == nil then
  tokens = capacity
  refilled_at = now
end

local elapsed = now - refilled_at
if elapsed > 0 then
  local added = math.floor(elapsed * refill_tokens / period_ms)
  if added > 0 then
    tokens = math.min(capacity, tokens + added)
    refilled_at = refilled_at + math.floor(added * period_ms / refill_tokens)
  end
end
if tokens >= capacity then
  tokens = capacity
  refilled_at = now
end

if tokens < 1 then
  local waited = now - refilled_at
  if waited < 0 then waited = 0 end
  local wait = math.ceil(period_ms / refill_tokens) - waited
  if wait < 1 then wait = 1 end
  return {0, tokens, wait}
end

tokens = tokens - 1
redis.call('HSET', KEYS[1], 'tokens', tokens, 'refilled_at', refilled_at)
redis.call('PEXPIRE', KEYS[1], idle_ttl_ms)
return {1, tokens, 0}
"#;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    consume: Script,
}

impl RedisStore {
    /// Build `redis://` or `rediss://` from the config. The password is
    /// percent-encoded by `Url`.
    pub fn connection_url(config: &RedisConfig) -> Result<Url, StoreError> {
        let scheme = if config.tls { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{}://{}:{}/", scheme, config.host, config.port))
            .map_err(|e| StoreError::Config(format!("redis url: {}", e)))?;

        if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| StoreError::Config("redis url cannot carry a password".into()))?;
        }
        Ok(url)
    }

    /// Connect, retrying with backoff per `connect_attempts`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let url = Self::connection_url(config)?;
        let client = redis::Client::open(url.as_str())?;

        let policy = RetryPolicy {
            max_attempts: config.connect_attempts,
            base_delay_ms: config.connect_base_delay_ms,
            max_delay_ms: config.connect_max_delay_ms,
        };
        let conn = retry_with_backoff("redis connect", policy, || {
            let client = client.clone();
            async move { ConnectionManager::new(client).await }
        })
        .await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = config.tls,
            "Connected to Redis"
        );

        Ok(Self {
            conn,
            op_timeout: Duration::from_millis(config.operation_timeout_ms),
            consume: Script::new(CONSUME_SCRIPT),
        })
    }

    /// Round-trip check used at startup.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let reply: String = self
            .bounded(async move { redis::cmd("PING").query_async::<_, String>(&mut conn).await })
            .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("PING answered {:?}", reply)))
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl RevocationStore for RedisStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = revocation_key(token);
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        let mut conn = self.conn.clone();
        self.bounded(async move {
            redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("PX")
                .arg(ttl_ms)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let key = revocation_key(token);
        let mut conn = self.conn.clone();
        let exists: i64 = self
            .bounded(async move {
                redis::cmd("EXISTS")
                    .arg(&key)
                    .query_async::<_, i64>(&mut conn)
                    .await
            })
            .await?;
        Ok(exists > 0)
    }
}

#[async_trait]
impl BucketStore for RedisStore {
    async fn try_consume(
        &self,
        key: &str,
        policy: &BucketPolicy,
        now_ms: i64,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut invocation = self.consume.key(key);
        invocation
            .arg(policy.capacity)
            .arg(policy.refill_tokens)
            .arg(policy.refill_period_ms())
            .arg(now_ms)
            .arg(policy.idle_ttl_ms());

        let mut conn = self.conn.clone();
        let reply: Vec<i64> = self
            .bounded(async move { invocation.invoke_async::<_, Vec<i64>>(&mut conn).await })
            .await?;

        match reply.as_slice() {
            [1, remaining, _] => Ok(ConsumeOutcome::Allowed {
                remaining: (*remaining).max(0) as u64,
            }),
            [0, _, wait_ms] => Ok(ConsumeOutcome::Rejected {
                retry_after: Duration::from_millis((*wait_ms).max(1) as u64),
            }),
            other => Err(StoreError::Protocol(format!(
                "consume script returned {:?}",
                other
            ))),
        }
    }
}

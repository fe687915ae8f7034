//! Distributed rate limiting middleware.
//!
//! One token bucket per client address, held in the shared store so every
//! instance draws from the same bucket. The store performs refill and consume
//! as one atomic step; this module only decides the key, the scope and the
//! response.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::store::{bucket_key, BucketPolicy, BucketStore, ConsumeOutcome, StoreError};

pub const X_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-rate-limit-remaining");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone)]
pub enum RateLimiter {
    Enabled {
        store: Arc<dyn BucketStore>,
        policy: BucketPolicy,
        /// Path prefixes the limiter applies to.
        scope: Arc<[String]>,
    },
    Disabled,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig, store: Arc<dyn BucketStore>) -> Self {
        if !config.enabled {
            return RateLimiter::Disabled;
        }
        RateLimiter::Enabled {
            store,
            policy: BucketPolicy {
                capacity: config.capacity,
                refill_tokens: config.refill_tokens,
                refill_period: Duration::from_secs(config.refill_period_secs),
                idle_ttl: Duration::from_secs(config.idle_eviction_secs),
            },
            scope: config.path_prefixes.clone().into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, RateLimiter::Enabled { .. })
    }

    /// `/auth` covers `/auth` and `/auth/...` but not `/authors`.
    pub fn applies_to(&self, path: &str) -> bool {
        match self {
            RateLimiter::Enabled { scope, .. } => scope.iter().any(|prefix| {
                let prefix = prefix.trim_end_matches('/');
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }),
            RateLimiter::Disabled => false,
        }
    }

    /// Take one token for `client`. `None` when disabled.
    pub async fn check(&self, client: &str) -> Result<Option<ConsumeOutcome>, StoreError> {
        self.check_at(client, Utc::now().timestamp_millis()).await
    }

    pub async fn check_at(
        &self,
        client: &str,
        now_ms: i64,
    ) -> Result<Option<ConsumeOutcome>, StoreError> {
        match self {
            RateLimiter::Enabled { store, policy, .. } => store
                .try_consume(&bucket_key(client), policy, now_ms)
                .await
                .map(Some)
                .inspect_err(|_| metrics::record_store_error("try_consume")),
            RateLimiter::Disabled => Ok(None),
        }
    }
}

/// First `X-Forwarded-For` entry when present and non-empty, else the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.applies_to(request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);

    match limiter.check(&client).await {
        Ok(Some(ConsumeOutcome::Allowed { remaining })) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(X_RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Ok(Some(ConsumeOutcome::Rejected { retry_after })) => {
            tracing::warn!(
                client = %client,
                path = %request.uri().path(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            ApiError::TooManyRequests { retry_after }.into_response()
        }
        Ok(None) => next.run(request).await,
        Err(e) => {
            tracing::error!(client = %client, error = %e, "Rate limiter failing closed");
            ApiError::ServiceUnavailable.into_response()
        }
    }
}

//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Validation is a pure
//! function `&AppConfig -> Result<(), Vec<ValidationError>>` and reports every
//! problem at once instead of stopping at the first.

use std::net::SocketAddr;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::config::schema::{AppConfig, StoreBackend};

/// HS256 keys shorter than the digest size are rejected.
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted token lifetime: ten years.
pub const MAX_EXPIRATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    match STANDARD.decode(config.jwt.secret_key.trim()) {
        Ok(bytes) if bytes.len() >= MIN_SECRET_BYTES => {}
        Ok(bytes) => errors.push(ValidationError::new(
            "jwt.secret_key",
            format!(
                "decodes to {} bytes, at least {} required",
                bytes.len(),
                MIN_SECRET_BYTES
            ),
        )),
        Err(e) => errors.push(ValidationError::new(
            "jwt.secret_key",
            format!("not valid base64: {}", e),
        )),
    }
    if config.jwt.expiration_secs == 0 {
        errors.push(ValidationError::new("jwt.expiration_secs", "must be > 0"));
    } else if config.jwt.expiration_secs > MAX_EXPIRATION_SECS {
        errors.push(ValidationError::new(
            "jwt.expiration_secs",
            format!("must be at most {} (ten years)", MAX_EXPIRATION_SECS),
        ));
    }

    let hashing = &config.password_hashing;
    if hashing.parallelism == 0 || hashing.iterations == 0 {
        errors.push(ValidationError::new(
            "password_hashing",
            "iterations and parallelism must be > 0",
        ));
    } else if hashing.memory_kib < 8 * hashing.parallelism {
        errors.push(ValidationError::new(
            "password_hashing.memory_kib",
            "must be at least 8 KiB per lane",
        ));
    }

    let needs_store = config.rate_limit.enabled || config.revocation.enabled;
    if needs_store && config.store.backend == StoreBackend::Redis {
        if config.redis.host.trim().is_empty() {
            errors.push(ValidationError::new("redis.host", "must not be empty"));
        }
        if config.redis.port == 0 {
            errors.push(ValidationError::new("redis.port", "must be non-zero"));
        }
        if config.redis.connect_attempts == 0 {
            errors.push(ValidationError::new("redis.connect_attempts", "must be > 0"));
        }
        if config.redis.operation_timeout_ms == 0 {
            errors.push(ValidationError::new("redis.operation_timeout_ms", "must be > 0"));
        }
    }

    let limits = &config.rate_limit;
    if limits.enabled {
        if limits.capacity == 0 {
            errors.push(ValidationError::new("rate_limit.capacity", "must be > 0"));
        }
        if limits.refill_tokens == 0 {
            errors.push(ValidationError::new("rate_limit.refill_tokens", "must be > 0"));
        }
        if limits.refill_period_secs == 0 {
            errors.push(ValidationError::new("rate_limit.refill_period_secs", "must be > 0"));
        }
        let full_refill = full_refill_secs(
            limits.capacity,
            limits.refill_tokens,
            limits.refill_period_secs,
        );
        if let Some(full_refill) = full_refill {
            // An evicted bucket comes back full, so eviction must not happen
            // before refill alone would have filled it.
            if limits.idle_eviction_secs < full_refill {
                errors.push(ValidationError::new(
                    "rate_limit.idle_eviction_secs",
                    format!(
                        "must be at least {} (time to refill an empty bucket)",
                        full_refill
                    ),
                ));
            }
        }
        if let Some(prefix) = limits.path_prefixes.iter().find(|p| !p.starts_with('/')) {
            errors.push(ValidationError::new(
                "rate_limit.path_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    for origin in &config.cors.allowed_origins {
        if !is_origin(origin) {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not an origin (scheme://host[:port])", origin),
            ));
        }
    }

    if config.admin.email.is_some() != config.admin.password.is_some() {
        errors.push(ValidationError::new(
            "admin",
            "email and password must be set together",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Seconds for an empty bucket to refill to capacity; `None` when the
/// policy itself is invalid (reported separately).
fn full_refill_secs(capacity: u64, refill_tokens: u64, period_secs: u64) -> Option<u64> {
    if capacity == 0 || refill_tokens == 0 || period_secs == 0 {
        return None;
    }
    Some(capacity.div_ceil(refill_tokens).saturating_mul(period_secs))
}

fn is_origin(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.path() == "/"
                && !value.ends_with('/')
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}

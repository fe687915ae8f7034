//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the task tracker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Token signing settings.
    pub jwt: JwtConfig,

    /// Password hashing cost parameters.
    pub password_hashing: PasswordHashingConfig,

    /// Which shared store backs revocation markers and rate-limit buckets.
    pub store: StoreConfig,

    /// Redis connection settings.
    pub redis: RedisConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Token revocation (logout blacklist) configuration.
    pub revocation: RevocationConfig,

    /// Cross-origin access for browser clients.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Optional administrator account seeded at startup.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// JWT signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Base64-encoded HMAC-SHA256 secret. Must decode to at least 32 bytes.
    pub secret_key: String,

    /// Token lifetime in seconds.
    pub expiration_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            // Intentionally empty: validation refuses to start without a secret.
            secret_key: String::new(),
            expiration_secs: 3600,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordHashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,

    /// Number of passes.
    pub iterations: u32,

    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Backend selection for the shared store.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Redis, shared by every instance.
    Redis,
    /// Process-local map. Only correct for a single instance.
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
        }
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,

    pub port: u16,

    /// Optional AUTH password. Blank means no password.
    pub password: Option<String>,

    /// Connect with TLS (`rediss://`).
    pub tls: bool,

    /// Connection attempts at startup before giving up.
    pub connect_attempts: u32,

    /// Base delay for exponential backoff between connection attempts.
    pub connect_base_delay_ms: u64,

    /// Maximum delay between connection attempts.
    pub connect_max_delay_ms: u64,

    /// Deadline for a single store round-trip on the request path.
    pub operation_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            tls: false,
            connect_attempts: 5,
            connect_base_delay_ms: 200,
            connect_max_delay_ms: 5000,
            operation_timeout_ms: 500,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Bucket capacity (burst size).
    pub capacity: u64,

    /// Tokens added per refill period.
    pub refill_tokens: u64,

    /// Refill period in seconds.
    pub refill_period_secs: u64,

    /// Idle buckets are evicted by the store after this many seconds.
    pub idle_eviction_secs: u64,

    /// Path prefixes the limiter applies to.
    pub path_prefixes: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10,
            refill_tokens: 10,
            refill_period_secs: 60,
            idle_eviction_secs: 3600,
            path_prefixes: vec!["/auth".to_string()],
        }
    }
}

/// Token revocation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Enable the logout blacklist. When disabled, `/auth/logout` is not mounted.
    pub enabled: bool,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// CORS policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins (scheme, host, port) allowed to call the API from a
    /// browser. Empty disables cross-origin access.
    pub allowed_origins: Vec<String>,

    /// How long browsers may cache a preflight answer.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            max_age_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Administrator account configuration.
///
/// Public registration always creates plain users; this is the only way an
/// account with the admin role comes into existence.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub email: Option<String>,

    pub password: Option<String>,
}

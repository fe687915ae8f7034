//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the shared store when any feature needs it
//! - Build token codec, session service and gates in dependency order
//! - Seed the configured administrator account
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - `assemble` takes its collaborators as arguments so tests can share one
//!   store between several instances

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::auth::credentials::{Argon2Encoder, MemoryUserDirectory, PasswordEncoder, UserDirectory};
use crate::auth::{AuthError, SessionService, TokenCodec};
use crate::config::{AppConfig, StoreBackend};
use crate::http::server::AppState;
use crate::security::{Authenticator, RateLimiter, Revocation, RoutePolicy};
use crate::store::{MemoryStore, RedisStore, SharedStores, StoreError};
use crate::tasks::TaskRepository;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("shared store: {0}")]
    Store(#[from] StoreError),

    #[error("authentication setup: {0}")]
    Auth(#[from] AuthError),

    #[error("{0} is enabled but no shared store was provided")]
    MissingStore(&'static str),
}

/// Connect the configured backend. `None` when neither revocation nor rate
/// limiting is enabled.
pub async fn connect_stores(config: &AppConfig) -> Result<Option<SharedStores>, StoreError> {
    if !config.rate_limit.enabled && !config.revocation.enabled {
        tracing::info!("Rate limiting and revocation disabled, no shared store needed");
        return Ok(None);
    }

    match config.store.backend {
        StoreBackend::Redis => {
            let store = Arc::new(RedisStore::connect(&config.redis).await?);
            store.ping().await?;
            Ok(Some(SharedStores::single(store)))
        }
        StoreBackend::Memory => {
            tracing::warn!(
                "Using the in-memory store: revocations and rate limits are not shared between instances"
            );
            let store = Arc::new(MemoryStore::new());
            spawn_sweeper(Arc::downgrade(&store));
            Ok(Some(SharedStores::single(store)))
        }
    }
}

/// Periodically drop expired entries; stops once the store is dropped.
fn spawn_sweeper(store: Weak<MemoryStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let removed = store.purge_expired(Utc::now().timestamp_millis());
            if removed > 0 {
                tracing::debug!(removed, "Purged expired store entries");
            }
        }
    });
}

/// Production wiring: configured store, in-memory directory, Argon2id.
pub async fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let stores = connect_stores(&config).await?;
    let users: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
    let encoder: Arc<dyn PasswordEncoder> = Arc::new(Argon2Encoder::new(&config.password_hashing)?);
    assemble(config, users, encoder, stores).await
}

pub async fn assemble(
    config: AppConfig,
    users: Arc<dyn UserDirectory>,
    encoder: Arc<dyn PasswordEncoder>,
    stores: Option<SharedStores>,
) -> Result<AppState, StartupError> {
    let tokens = Arc::new(TokenCodec::new(&config.jwt)?);

    let revocation = if config.revocation.enabled {
        let stores = stores
            .as_ref()
            .ok_or(StartupError::MissingStore("revocation"))?;
        Revocation::enabled(stores.revocation.clone())
    } else {
        Revocation::Disabled
    };

    let rate_limiter = if config.rate_limit.enabled {
        let stores = stores
            .as_ref()
            .ok_or(StartupError::MissingStore("rate limiting"))?;
        RateLimiter::from_config(&config.rate_limit, stores.buckets.clone())
    } else {
        RateLimiter::Disabled
    };

    let sessions = Arc::new(SessionService::new(
        users.clone(),
        encoder,
        tokens.clone(),
        revocation.clone(),
    ));

    if let (Some(email), Some(password)) = (&config.admin.email, &config.admin.password) {
        sessions.ensure_admin(email, password).await?;
    }

    let authenticator = Authenticator::new(tokens, users.clone(), revocation);

    tracing::info!(
        backend = ?config.store.backend,
        revocation = sessions.revocation().is_enabled(),
        rate_limit = rate_limiter.is_enabled(),
        token_ttl_secs = config.jwt.expiration_secs,
        "Application state assembled"
    );

    Ok(AppState {
        config: Arc::new(config),
        sessions,
        authenticator,
        rate_limiter,
        route_policy: RoutePolicy::default(),
        users,
        tasks: Arc::new(TaskRepository::new()),
        started_at: Instant::now(),
    })
}

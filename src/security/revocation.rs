//! Token revocation capability.
//!
//! Selected once at startup. When enabled, every check and write goes to the
//! shared store and store failures propagate so callers can fail closed.
//! When disabled, nothing is ever revoked and nothing can fail.

use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::store::{RevocationStore, StoreError};

#[derive(Clone)]
pub enum Revocation {
    Enabled { store: Arc<dyn RevocationStore> },
    Disabled,
}

impl Revocation {
    pub fn enabled(store: Arc<dyn RevocationStore>) -> Self {
        Revocation::Enabled { store }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Revocation::Enabled { .. })
    }

    /// Returns `false` without touching the store when disabled.
    pub async fn revoke(&self, token: &str, ttl: Duration) -> Result<bool, StoreError> {
        match self {
            Revocation::Enabled { store } => {
                store.revoke(token, ttl).await.inspect_err(|e| {
                    metrics::record_store_error("revoke");
                    tracing::error!(error = %e, "Failed to write revocation marker");
                })?;
                metrics::record_token_revoked();
                Ok(true)
            }
            Revocation::Disabled => Ok(false),
        }
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        match self {
            Revocation::Enabled { store } => store.is_revoked(token).await.inspect_err(|e| {
                metrics::record_store_error("is_revoked");
                tracing::error!(error = %e, "Failed to check revocation marker");
            }),
            Revocation::Disabled => Ok(false),
        }
    }
}

impl std::fmt::Debug for Revocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revocation::Enabled { .. } => f.write_str("Revocation::Enabled"),
            Revocation::Disabled => f.write_str("Revocation::Disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_enabled_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let revocation = Revocation::enabled(store.clone());

        assert!(!revocation.is_revoked("t").await.unwrap());
        assert!(revocation.revoke("t", Duration::from_secs(60)).await.unwrap());
        assert!(revocation.is_revoked("t").await.unwrap());
        assert!(store.revocation_ttl("t").is_some());
    }

    #[tokio::test]
    async fn test_disabled_is_inert() {
        let revocation = Revocation::Disabled;
        assert!(!revocation.revoke("t", Duration::from_secs(60)).await.unwrap());
        assert!(!revocation.is_revoked("t").await.unwrap());
    }
}

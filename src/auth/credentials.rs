//! User storage and password hashing.
//!
//! # Responsibilities
//! - Look up principals by identity, insert new ones atomically
//! - Hash and verify credentials with Argon2id
//!
//! Both concerns are traits so the session service can be driven by fakes in
//! tests and by a real database later without touching the gates.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::principal::Principal;
use super::AuthError;
use crate::config::schema::PasswordHashingConfig;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, AuthError>;

    async fn exists(&self, identity: &str) -> Result<bool, AuthError>;

    /// Insert if no principal with the same identity exists.
    /// Returns `false` when the identity was already taken.
    async fn insert(&self, principal: Principal) -> Result<bool, AuthError>;

    async fn count(&self) -> Result<usize, AuthError>;
}

/// Identities are matched case-insensitively.
fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, Principal>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, AuthError> {
        Ok(self.users.get(&normalize(identity)).map(|p| p.clone()))
    }

    async fn exists(&self, identity: &str) -> Result<bool, AuthError> {
        Ok(self.users.contains_key(&normalize(identity)))
    }

    async fn insert(&self, principal: Principal) -> Result<bool, AuthError> {
        match self.users.entry(normalize(&principal.identity)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(principal);
                Ok(true)
            }
        }
    }

    async fn count(&self) -> Result<usize, AuthError> {
        Ok(self.users.len())
    }
}

/// One-way credential hashing. Implementations are CPU-bound; callers run
/// them off the async executor.
pub trait PasswordEncoder: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String, AuthError>;

    /// `false` for a wrong password and for an unparseable hash alike.
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

#[derive(Clone)]
pub struct Argon2Encoder {
    argon2: Argon2<'static>,
}

impl Argon2Encoder {
    pub fn new(config: &PasswordHashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordEncoder for Argon2Encoder {
    fn hash(&self, raw: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(rand::thread_rng());
        self.argon2
            .hash_password(raw.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2.verify_password(raw.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for Argon2Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Encoder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;

    fn cheap() -> Argon2Encoder {
        Argon2Encoder::new(&PasswordHashingConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let encoder = cheap();
        let hash = encoder.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(encoder.verify("correct horse", &hash));
        assert!(!encoder.verify("wrong horse", &hash));
    }

    #[test]
    fn test_salted_hashes_differ() {
        let encoder = cheap();
        assert_ne!(encoder.hash("same").unwrap(), encoder.hash("same").unwrap());
    }

    #[test]
    fn test_garbage_hash_does_not_verify() {
        assert!(!cheap().verify("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Encoder::new(&PasswordHashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_directory_insert_if_absent() {
        let users = MemoryUserDirectory::new();
        let first = Principal::new("Alice@Example.com", "A", "L", "h1", Role::User);
        let second = Principal::new("alice@example.com", "X", "Y", "h2", Role::User);

        assert!(users.insert(first).await.unwrap());
        assert!(!users.insert(second).await.unwrap());
        assert_eq!(users.count().await.unwrap(), 1);

        let found = users.find_by_identity("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(found.credential_hash, "h1");
        assert!(users.exists("alice@example.com").await.unwrap());
        assert!(!users.exists("bob@example.com").await.unwrap());
    }
}

//! Session lifecycle: register, authenticate, logout.
//!
//! # Responsibilities
//! - Register new principals (always with the plain user role) and issue a token
//! - Exchange credentials for a token
//! - Revoke a token for the rest of its natural lifetime
//!
//! # Design Decisions
//! - Duplicate identities are rejected before any hashing work happens
//! - Argon2 runs on the blocking pool, never on the async executor
//! - Unknown identities still pay for one verification against a dummy hash,
//!   so response time does not reveal which emails are registered

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use tokio::sync::OnceCell;
use validator::{Validate, ValidationErrors};

use super::credentials::{PasswordEncoder, UserDirectory};
use super::principal::{Principal, Role};
use super::token::TokenCodec;
use super::AuthError;
use crate::security::revocation::Revocation;

/// Password used to build the timing-equalisation hash. Never matches a login.
const DUMMY_PASSWORD: &str = "dummy-password-for-timing";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Email must be a valid address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl RegisterRequest {
    fn trimmed(mut self) -> Self {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Marker written; the token is dead cluster-wide for `ttl`.
    Revoked { ttl: Duration },
    /// Token already past `exp`; nothing to write.
    AlreadyExpired,
    /// Revocation is disabled; the token stays usable until it expires.
    NotTracked,
}

/// Flatten validator output into one message, fields in stable order.
pub fn describe_validation(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct SessionService {
    users: Arc<dyn UserDirectory>,
    encoder: Arc<dyn PasswordEncoder>,
    tokens: Arc<TokenCodec>,
    revocation: Revocation,
    dummy_hash: OnceCell<String>,
}

impl SessionService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        encoder: Arc<dyn PasswordEncoder>,
        tokens: Arc<TokenCodec>,
        revocation: Revocation,
    ) -> Self {
        Self {
            users,
            encoder,
            tokens,
            revocation,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCodec> {
        &self.tokens
    }

    pub fn revocation(&self) -> &Revocation {
        &self.revocation
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<String, AuthError> {
        let request = request.trimmed();
        request
            .validate()
            .map_err(|e| AuthError::Validation(describe_validation(&e)))?;

        if self.users.exists(&request.email).await? {
            tracing::info!(identity = %request.email, "Registration rejected: identity exists");
            return Err(AuthError::IdentityAlreadyExists(request.email));
        }

        let hash = self.hash(request.password).await?;
        let principal = Principal::new(
            request.email,
            request.first_name,
            request.last_name,
            hash,
            Role::User,
        );

        // Lost a race with a concurrent registration for the same identity.
        if !self.users.insert(principal.clone()).await? {
            return Err(AuthError::IdentityAlreadyExists(principal.identity));
        }

        tracing::info!(identity = %principal.identity, id = %principal.id, "Principal registered");
        self.tokens.issue(&principal.identity, Map::new())
    }

    /// Seed an administrator. Returns `false` if the identity already exists.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        let email = email.trim().to_lowercase();
        if self.users.exists(&email).await? {
            return Ok(false);
        }
        let hash = self.hash(password.to_string()).await?;
        let principal = Principal::new(email, "Admin", "Admin", hash, Role::Admin);
        let created = self.users.insert(principal).await?;
        if created {
            tracing::info!("Administrator account seeded");
        }
        Ok(created)
    }

    pub async fn authenticate(&self, request: AuthenticateRequest) -> Result<String, AuthError> {
        let identity = request.email.trim().to_lowercase();

        let principal = match self.users.find_by_identity(&identity).await? {
            Some(principal) => principal,
            None => {
                let dummy = self.dummy_hash().await?;
                self.verify(request.password, dummy).await?;
                tracing::info!("Authentication failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self
            .verify(request.password, principal.credential_hash.clone())
            .await?
        {
            tracing::info!("Authentication failed");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::debug!(identity = %principal.identity, "Authenticated");
        self.tokens.issue(&principal.identity, Map::new())
    }

    pub async fn logout(&self, token: &str) -> Result<LogoutOutcome, AuthError> {
        self.logout_at(token, Utc::now()).await
    }

    pub async fn logout_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<LogoutOutcome, AuthError> {
        let claims = self.tokens.verify(token)?;

        let Some(ttl) = claims.remaining(now)? else {
            tracing::debug!(subject = %claims.sub, "Logout of expired token, nothing to revoke");
            return Ok(LogoutOutcome::AlreadyExpired);
        };

        if self.revocation.revoke(token, ttl).await? {
            tracing::info!(subject = %claims.sub, ttl_secs = ttl.as_secs(), "Token revoked");
            Ok(LogoutOutcome::Revoked { ttl })
        } else {
            Ok(LogoutOutcome::NotTracked)
        }
    }

    async fn dummy_hash(&self) -> Result<String, AuthError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD.to_string()))
            .await
            .cloned()
    }

    async fn hash(&self, raw: String) -> Result<String, AuthError> {
        let encoder = self.encoder.clone();
        tokio::task::spawn_blocking(move || encoder.hash(&raw))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    async fn verify(&self, raw: String, hash: String) -> Result<bool, AuthError> {
        let encoder = self.encoder.clone();
        tokio::task::spawn_blocking(move || encoder.verify(&raw, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }
}

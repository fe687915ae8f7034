//! Authentication gate.
//!
//! # Responsibilities
//! - Read the bearer token from `Authorization`
//! - Verify signature, resolve the subject, check expiry and revocation
//! - Attach a [`SecurityContext`] to the request for downstream extractors
//!
//! # Design Decisions
//! - The gate never answers 401/403 itself; it only classifies. Route policy
//!   (`access_control.rs`) decides what an anonymous request may reach
//! - An unknown subject is reported exactly like a bad signature
//! - A revocation store failure fails the request closed (503)

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::auth::credentials::UserDirectory;
use crate::auth::principal::Principal;
use crate::auth::token::TokenCodec;
use crate::auth::AuthError;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::revocation::Revocation;
use crate::store::StoreError;

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request ended up anonymous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousReason {
    NoCredentials,
    InvalidToken,
    ExpiredToken,
    RevokedToken,
}

impl AnonymousReason {
    fn as_str(&self) -> &'static str {
        match self {
            AnonymousReason::NoCredentials => "anonymous",
            AnonymousReason::InvalidToken => "invalid_token",
            AnonymousReason::ExpiredToken => "expired_token",
            AnonymousReason::RevokedToken => "revoked_token",
        }
    }
}

/// Request-scoped identity, inserted as a request extension.
#[derive(Debug, Clone)]
pub enum SecurityContext {
    Anonymous(AnonymousReason),
    Authenticated(Principal),
}

impl SecurityContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            SecurityContext::Authenticated(principal) => Some(principal),
            SecurityContext::Anonymous(_) => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            SecurityContext::Authenticated(_) => "authenticated",
            SecurityContext::Anonymous(reason) => reason.as_str(),
        }
    }
}

/// Token after `"Bearer "`, if the header is present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

#[derive(Clone)]
pub struct Authenticator {
    tokens: Arc<TokenCodec>,
    users: Arc<dyn UserDirectory>,
    revocation: Revocation,
}

impl Authenticator {
    pub fn new(
        tokens: Arc<TokenCodec>,
        users: Arc<dyn UserDirectory>,
        revocation: Revocation,
    ) -> Self {
        Self {
            tokens,
            users,
            revocation,
        }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<SecurityContext, StoreError> {
        match bearer_token(headers) {
            Some(token) => self.resolve_token(token, Utc::now()).await,
            None => Ok(SecurityContext::Anonymous(AnonymousReason::NoCredentials)),
        }
    }

    /// Classify `token` at `now`. Only a store failure is an error.
    pub async fn resolve_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SecurityContext, StoreError> {
        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(_) => return Ok(SecurityContext::Anonymous(AnonymousReason::InvalidToken)),
        };

        let principal = match self.users.find_by_identity(&claims.sub).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Ok(SecurityContext::Anonymous(AnonymousReason::InvalidToken)),
            Err(AuthError::Store(e)) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "User lookup failed");
                return Ok(SecurityContext::Anonymous(AnonymousReason::InvalidToken));
            }
        };

        if !claims.is_valid_for(&principal.identity, now) {
            tracing::debug!(subject = %claims.sub, exp = claims.exp, "Rejected expired token");
            return Ok(SecurityContext::Anonymous(AnonymousReason::ExpiredToken));
        }

        if self.revocation.is_revoked(token).await? {
            tracing::debug!(subject = %claims.sub, "Rejected revoked token");
            return Ok(SecurityContext::Anonymous(AnonymousReason::RevokedToken));
        }

        Ok(SecurityContext::Authenticated(principal))
    }
}

/// Middleware: classify the caller and attach the [`SecurityContext`].
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    if matches!(
        request.extensions().get::<SecurityContext>(),
        Some(SecurityContext::Authenticated(_))
    ) {
        return next.run(request).await;
    }

    match authenticator.resolve(request.headers()).await {
        Ok(context) => {
            metrics::record_gate_outcome(context.outcome());
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            tracing::error!(error = %e, path = %request.uri().path(), "Authentication gate failing closed");
            ApiError::ServiceUnavailable.into_response()
        }
    }
}

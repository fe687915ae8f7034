//! Route policy and principal extraction.
//!
//! Public routes and CORS preflights pass through untouched. Everything else requires an
//! authenticated [`SecurityContext`]; handlers then read the principal with the
//! [`CurrentUser`] extractor and check finer authorities with
//! [`require_authority`].

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::principal::Principal;
use crate::http::response::ApiError;
use crate::security::authentication::SecurityContext;

/// Paths reachable without a token.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    public_prefixes: Arc<[String]>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(["/auth", "/health"])
    }
}

impl RoutePolicy {
    pub fn new<I, S>(public_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public_prefixes: public_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| {
            path == prefix.as_str()
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Whether a request may proceed without a principal. `OPTIONS` is
    /// always allowed so browsers can preflight protected routes.
    pub fn permits_anonymous(&self, method: &Method, path: &str) -> bool {
        *method == Method::OPTIONS || self.is_public(path)
    }
}

/// Answer 401 for anonymous requests to protected paths.
pub async fn access_control_middleware(
    State(policy): State<RoutePolicy>,
    request: Request,
    next: Next,
) -> Response {
    if policy.permits_anonymous(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match request.extensions().get::<SecurityContext>() {
        Some(SecurityContext::Authenticated(_)) => next.run(request).await,
        _ => ApiError::unauthorized().into_response(),
    }
}

/// The authenticated principal of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<SecurityContext>() {
            Some(SecurityContext::Authenticated(principal)) => Ok(CurrentUser(principal.clone())),
            _ => Err(ApiError::unauthorized()),
        }
    }
}

/// 401 without a principal, 403 when it lacks `authority`.
pub fn require_authority<'a>(
    context: Option<&'a SecurityContext>,
    authority: &str,
) -> Result<&'a Principal, ApiError> {
    let principal = context
        .and_then(SecurityContext::principal)
        .ok_or_else(ApiError::unauthorized)?;
    if principal.has_authority(authority) {
        Ok(principal)
    } else {
        tracing::warn!(identity = %principal.identity, authority, "Missing authority");
        Err(ApiError::Forbidden)
    }
}

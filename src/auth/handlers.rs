//! `/auth/*` endpoints.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::Serialize;

use super::session::{AuthenticateRequest, LogoutOutcome, RegisterRequest, TokenResponse};
use crate::http::request::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::authentication::bearer_token;

/// Logout is only mounted while revocation is enabled; without it a logout
/// could not invalidate anything.
pub fn routes(revocation_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/authenticate", post(authenticate));
    if revocation_enabled {
        router.route("/auth/logout", post(logout))
    } else {
        router
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
    pub status: &'static str,
}

async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.sessions.register(request).await?;
    Ok(Json(TokenResponse { token }))
}

async fn authenticate(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AuthenticateRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.sessions.authenticate(request).await?;
    Ok(Json(TokenResponse { token }))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthorized)?;

    match state.sessions.logout(token).await? {
        LogoutOutcome::Revoked { .. } | LogoutOutcome::AlreadyExpired => {}
        LogoutOutcome::NotTracked => {
            tracing::warn!("Logout called with revocation disabled");
        }
    }

    Ok(Json(LogoutResponse {
        message: "Logout successful",
        status: "200",
    }))
}

//! Caller-visible errors and the JSON error body.
//!
//! # Responsibilities
//! - Map domain errors to HTTP status codes
//! - Render every error response as `{statusCode, message, timestamp, path}`
//!
//! # Design Decisions
//! - Handlers and gates return [`ApiError`]; it only knows status and message.
//!   The request path is not available there, so the body is built by the
//!   [`render_errors`] middleware, which sees both request and response
//! - Framework-generated errors (unknown route, body too large, timeout) get
//!   the same body shape
//! - 5xx messages are generic; details only reach the logs

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthError;

/// Largest framework error body read back when re-rendering.
const MAX_PASSTHROUGH_BODY: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests. Please try again after {} seconds.", wait_secs(.retry_after))]
    TooManyRequests { retry_after: Duration },

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal server error")]
    Internal,
}

fn wait_secs(retry_after: &Duration) -> u64 {
    retry_after_secs(*retry_after)
}

/// Whole seconds a client should wait, never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_millis().div_ceil(1000).max(1) as u64
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Authentication required".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::RevokedToken => {
                ApiError::Unauthorized("Invalid or expired token".to_string())
            }
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::IdentityAlreadyExists(_) => ApiError::Conflict(err.to_string()),
            AuthError::Validation(message) => ApiError::BadRequest(message),
            AuthError::Store(e) => {
                tracing::error!(error = %e, "Shared store unavailable");
                ApiError::ServiceUnavailable
            }
            AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Key(_) => {
                tracing::error!(error = %err, "Internal authentication failure");
                ApiError::Internal
            }
        }
    }
}

/// Message carried from an [`ApiError`] to [`render_errors`].
#[derive(Debug, Clone)]
pub struct ErrorMessage(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        if let ApiError::TooManyRequests { retry_after } = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(*retry_after)),
            );
        }
        response
            .extensions_mut()
            .insert(ErrorMessage(self.to_string()));
        response
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub timestamp: String,
    pub path: String,
}

/// Give every error response the structured JSON body.
pub async fn render_errors(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let message = match parts.extensions.remove::<ErrorMessage>() {
        Some(ErrorMessage(message)) => message,
        None if is_json(&parts.headers) => {
            return Response::from_parts(parts, body);
        }
        None => passthrough_message(status, body).await,
    };

    let body = ErrorBody {
        status_code: status.as_u16(),
        message,
        timestamp: Utc::now().to_rfc3339(),
        path,
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    let rendered = Json(body).into_response();
    let (rendered_parts, rendered_body) = rendered.into_parts();
    parts.headers.extend(rendered_parts.headers);
    Response::from_parts(parts, rendered_body)
}

fn is_json(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

async fn passthrough_message(status: StatusCode, body: Body) -> String {
    if status.is_client_error() {
        if let Ok(bytes) = axum::body::to_bytes(body, MAX_PASSTHROUGH_BODY).await {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

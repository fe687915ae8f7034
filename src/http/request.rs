//! Request-side helpers.
//!
//! # Responsibilities
//! - Name the request ID header and read it back for logging
//! - Decode JSON bodies with rejections mapped onto [`ApiError`]

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::HeaderMap,
    Json,
};
use serde::de::DeserializeOwned;

use crate::http::response::ApiError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID set by the outermost layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// `Json<T>` whose rejections (bad syntax, wrong shape, missing content
/// type) all answer 400 with the structured error body.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::BadRequest("Expected request with `Content-Type: application/json`".into())
        }
        other if other.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::BadRequest("Request body too large".into())
        }
        other => ApiError::BadRequest(other.body_text()),
    }
}

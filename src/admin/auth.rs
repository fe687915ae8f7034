use axum::{extract::Request, middleware::Next, response::Response};

use crate::auth::principal::Permission;
use crate::http::response::ApiError;
use crate::security::access_control::require_authority;
use crate::security::SecurityContext;

/// Admin routes need `admin:read` on top of being authenticated.
pub async fn admin_auth_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    require_authority(
        request.extensions().get::<SecurityContext>(),
        Permission::AdminRead.as_str(),
    )?;
    Ok(next.run(request).await)
}

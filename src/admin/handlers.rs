use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::principal::PrincipalView;
use crate::config::StoreBackend;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::CurrentUser;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub store_backend: StoreBackend,
    pub revocation_enabled: bool,
    pub rate_limit_enabled: bool,
    pub registered_users: usize,
    pub tracked_tasks: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let registered_users = state.users.count().await?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        store_backend: state.config.store.backend,
        revocation_enabled: state.sessions.revocation().is_enabled(),
        rate_limit_enabled: state.rate_limiter.is_enabled(),
        registered_users,
        tracked_tasks: state.tasks.len(),
    }))
}

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PrincipalView> {
    Json(PrincipalView::from(&user))
}

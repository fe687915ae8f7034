use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use super::repository::{NewTask, Task, UpdateTask};
use crate::auth::session::describe_validation;
use crate::http::request::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::CurrentUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Task {} not found", id))
}

async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Task>> {
    Json(state.tasks.list(user.id))
}

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(new): JsonBody<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    new.validate()
        .map_err(|e| ApiError::BadRequest(describe_validation(&e)))?;
    let task = state.tasks.create(user.id, new);
    tracing::debug!(task_id = %task.id, owner = %user.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    state.tasks.get(user.id, id).map(Json).ok_or_else(|| not_found(id))
}

async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    JsonBody(update): JsonBody<UpdateTask>,
) -> Result<Json<Task>, ApiError> {
    update
        .validate()
        .map_err(|e| ApiError::BadRequest(describe_validation(&e)))?;
    state
        .tasks
        .update(user.id, id, update)
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.tasks.delete(user.id, id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    services::tasks::{CreateTaskInput, TaskFilter, UpdateTaskInput},
};

pub fn task_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/tareas", get(list_tasks))
        .route("/tareas/:id", get(get_task));

    let write = Router::new()
        .route("/tareas", post(create_task))
        .route("/tareas/:id", put(update_task).delete(delete_task))
        .route("/tareas/:id/completar", post(complete_task))
        .with_write_access();

    read.merge(write)
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<TaskFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .tasks
        .list_tasks(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state.services.tasks.get_task(id).await?;
    Ok(success_response(task))
}

async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTaskInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state
        .services
        .tasks
        .create_task(payload, Some(user.user_id))
        .await?;
    info!(task_id = %task.id, "Task created");
    Ok(created_response(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state.services.tasks.update_task(id, payload).await?;
    Ok(success_response(task))
}

async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state.services.tasks.complete_task(id).await?;
    Ok(success_response(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.tasks.delete_task(id).await?;
    info!(task_id = %id, "Task deleted");
    Ok(no_content_response())
}

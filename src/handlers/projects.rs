use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    models::project_workflow::ProjectStage,
    services::projects::{CreateProjectInput, ProjectFilter, UpdateProjectInput},
};

#[derive(Debug, Deserialize)]
pub struct SetStageRequest {
    pub stage: ProjectStage,
}

/// `/proyectos` routes: CRUD plus the fulfillment workflow.
pub fn project_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/proyectos", get(list_projects))
        .route("/proyectos/:id", get(get_project));

    let write = Router::new()
        .route("/proyectos", post(create_project))
        .route(
            "/proyectos/:id",
            put(update_project).delete(delete_project),
        )
        .route("/proyectos/:id/estado", put(set_stage))
        .route("/proyectos/:id/avanzar", post(advance))
        .route(
            "/proyectos/:id/etapas/:stage",
            put(put_stage_detail).delete(clear_stage_detail),
        )
        .with_write_access();

    read.merge(write)
}

async fn list_projects(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ProjectFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .projects
        .list_projects(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state.services.projects.get_project(id).await?;
    Ok(success_response(project))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProjectInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state
        .services
        .projects
        .create_project(payload, Some(user.user_id))
        .await?;
    info!(project_id = %project.id, order_number = project.order_number, "Project created");
    Ok(created_response(project))
}

async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state.services.projects.update_project(id, payload).await?;
    Ok(success_response(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.projects.delete_project(id).await?;
    info!(project_id = %id, "Project deleted");
    Ok(no_content_response())
}

async fn set_stage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state.services.projects.set_stage(id, payload.stage).await?;
    Ok(success_response(project))
}

async fn advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state.services.projects.advance(id).await?;
    Ok(success_response(project))
}

async fn put_stage_detail(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, ProjectStage)>,
    Json(document): Json<Value>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state
        .services
        .projects
        .put_stage_detail(id, stage, document)
        .await?;
    Ok(success_response(project))
}

async fn clear_stage_detail(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, ProjectStage)>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state
        .services
        .projects
        .clear_stage_detail(id, stage)
        .await?;
    Ok(success_response(project))
}

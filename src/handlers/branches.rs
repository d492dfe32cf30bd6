use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response};
use crate::{
    auth::{AuthRouterExt, UserRole},
    errors::ServiceError,
    handlers::AppState,
    services::branches::{CreateBranchInput, UpdateBranchInput},
};

/// `/sucursales` routes; writes are admin only.
pub fn branch_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/sucursales", get(list_branches))
        .route("/sucursales/:id", get(get_branch));

    let admin = Router::new()
        .route("/sucursales", post(create_branch))
        .route("/sucursales/:id", put(update_branch).delete(delete_branch))
        .with_role(&[UserRole::Admin]);

    read.merge(admin)
}

async fn list_branches(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let branches = state.services.branches.list_branches().await?;
    Ok(success_response(branches))
}

async fn get_branch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let branch = state.services.branches.get_branch(id).await?;
    Ok(success_response(branch))
}

async fn create_branch(
    State(state): State<AppState>,
    Json(payload): Json<CreateBranchInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let branch = state.services.branches.create_branch(payload).await?;
    info!(branch_id = %branch.id, "Branch created");
    Ok(created_response(branch))
}

async fn update_branch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBranchInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let branch = state.services.branches.update_branch(id, payload).await?;
    Ok(success_response(branch))
}

async fn delete_branch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.branches.delete_branch(id).await?;
    info!(branch_id = %id, "Branch deleted");
    Ok(no_content_response())
}

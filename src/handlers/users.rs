use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::{AuthRouterExt, AuthUser, UserRole},
    errors::ServiceError,
    handlers::AppState,
    services::users::{ChangePasswordInput, CreateUserInput, UpdateProfileInput, UpdateUserInput},
};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
}

/// `/usuarios` routes. Everyone with a session may read and manage their own
/// profile; account administration is admin only.
pub fn user_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/usuarios", get(list_users))
        .route("/usuarios/me", get(get_me).put(update_me))
        .route("/usuarios/me/password", put(change_password))
        .route("/usuarios/:id", get(get_user));

    let admin = Router::new()
        .route("/usuarios", post(create_user))
        .route("/usuarios/:id", put(update_user).delete(delete_user))
        .with_role(&[UserRole::Admin]);

    read.merge(admin)
}

async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .users
        .list_users(query.search.as_deref(), pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.users.get_user(id).await?;
    Ok(success_response(profile))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUserInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.users.create_user(payload).await?;
    info!(user_id = %created.id, created_by = %user.user_id, "User created");
    Ok(created_response(created))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.services.users.update_user(id, payload).await?;
    Ok(success_response(updated))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.users.delete_user(id, user.user_id).await?;
    info!(user_id = %id, deleted_by = %user.user_id, "User deleted");
    Ok(no_content_response())
}

async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.users.get_user(user.user_id).await?;
    Ok(success_response(profile))
}

async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state
        .services
        .users
        .update_profile(user.user_id, payload)
        .await?;
    Ok(success_response(profile))
}

async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .users
        .change_password(user.user_id, payload)
        .await?;
    Ok(success_response(serde_json::json!({ "password_changed": true })))
}

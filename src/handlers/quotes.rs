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
    services::quotes::{ChangeStageInput, CreateQuoteInput, QuoteFilter, UpdateQuoteInput},
};

/// `/cotizaciones` routes: CRUD, stage changes with history, project hand-off.
pub fn quote_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/cotizaciones", get(list_quotes))
        .route("/cotizaciones/:id", get(get_quote))
        .route("/cotizaciones/:id/historial", get(stage_history));

    let write = Router::new()
        .route("/cotizaciones", post(create_quote))
        .route("/cotizaciones/:id", put(update_quote).delete(delete_quote))
        .route("/cotizaciones/:id/etapa", put(change_stage))
        .route("/cotizaciones/:id/proyecto", post(create_project))
        .with_write_access();

    read.merge(write)
}

async fn list_quotes(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<QuoteFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .quotes
        .list_quotes(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state.services.quotes.get_quote(id).await?;
    Ok(success_response(quote))
}

async fn create_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateQuoteInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .create_quote(payload, Some(user.user_id))
        .await?;
    info!(quote_id = %quote.id, number = quote.number, "Quote created");
    Ok(created_response(quote))
}

async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuoteInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state.services.quotes.update_quote(id, payload).await?;
    Ok(success_response(quote))
}

async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.quotes.delete_quote(id).await?;
    info!(quote_id = %id, "Quote deleted");
    Ok(no_content_response())
}

async fn change_stage(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeStageInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let quote = state
        .services
        .quotes
        .change_stage(id, payload, Some(user.user_id))
        .await?;
    Ok(success_response(quote))
}

async fn stage_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let history = state.services.quotes.stage_history(id).await?;
    Ok(success_response(history))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state
        .services
        .quotes
        .create_project(id, Some(user.user_id))
        .await?;
    info!(quote_id = %id, project_id = %project.id, "Project created from quote");
    Ok(created_response(project))
}

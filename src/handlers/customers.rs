use axum::{
    extract::{Json, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    services::{
        activity::{CreateInteractionInput, CreateNoteInput},
        customers::{CreateCustomerInput, CustomerFilter, UpdateCustomerInput},
    },
};

/// `/clientes` routes including the nested notes and interactions.
pub fn customer_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/clientes", get(list_customers))
        .route("/clientes/export", get(export_customers))
        .route("/clientes/:id", get(get_customer))
        .route("/clientes/:id/notas", get(list_notes))
        .route("/clientes/:id/interacciones", get(list_interactions));

    let write = Router::new()
        .route("/clientes", post(create_customer))
        .route("/clientes/:id", put(update_customer).delete(delete_customer))
        .route("/clientes/:id/notas", post(add_note))
        .route("/clientes/:id/notas/:note_id", delete(delete_note))
        .route("/clientes/:id/interacciones", post(add_interaction))
        .with_write_access();

    read.merge(write)
}

async fn list_customers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<CustomerFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .customers
        .list_customers(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

/// CSV download of every customer matching the filter
async fn export_customers(
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let csv = state.services.customers.export_csv(&filter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"clientes.csv\"",
            ),
        ],
        csv,
    ))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.get_customer(id).await?;
    Ok(success_response(customer))
}

async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state
        .services
        .customers
        .create_customer(payload, Some(user.user_id))
        .await?;
    info!(customer_id = %customer.id, "Customer created");
    Ok(created_response(customer))
}

async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let customer = state.services.customers.update_customer(id, payload).await?;
    Ok(success_response(customer))
}

async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.customers.delete_customer(id).await?;
    info!(customer_id = %id, "Customer deleted");
    Ok(no_content_response())
}

async fn list_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let notes = state.services.activity.list_notes(id).await?;
    Ok(success_response(notes))
}

async fn add_note(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateNoteInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let note = state
        .services
        .activity
        .add_note(id, payload, Some(user.user_id))
        .await?;
    Ok(created_response(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Path((id, note_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.activity.delete_note(id, note_id).await?;
    Ok(no_content_response())
}

async fn list_interactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let interactions = state.services.activity.list_interactions(id).await?;
    Ok(success_response(interactions))
}

async fn add_interaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateInteractionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let interaction = state
        .services
        .activity
        .add_interaction(id, payload, Some(user.user_id))
        .await?;
    Ok(created_response(interaction))
}

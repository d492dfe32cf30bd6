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
    auth::AuthRouterExt,
    errors::ServiceError,
    handlers::AppState,
    services::suppliers::{CreateSupplierInput, UpdateSupplierInput},
};

#[derive(Debug, Default, Deserialize)]
pub struct SupplierListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

pub fn supplier_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/proveedores", get(list_suppliers))
        .route("/proveedores/:id", get(get_supplier));

    let write = Router::new()
        .route("/proveedores", post(create_supplier))
        .route(
            "/proveedores/:id",
            put(update_supplier).delete(delete_supplier),
        )
        .with_write_access();

    read.merge(write)
}

async fn list_suppliers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<SupplierListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .suppliers
        .list_suppliers(
            query.search.as_deref(),
            query.category.as_deref(),
            pagination.to_request(&state.config),
        )
        .await?;
    Ok(success_response(page))
}

async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state.services.suppliers.get_supplier(id).await?;
    Ok(success_response(supplier))
}

async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state.services.suppliers.create_supplier(payload).await?;
    info!(supplier_id = %supplier.id, "Supplier created");
    Ok(created_response(supplier))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state.services.suppliers.update_supplier(id, payload).await?;
    Ok(success_response(supplier))
}

async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.suppliers.delete_supplier(id).await?;
    info!(supplier_id = %id, "Supplier deleted");
    Ok(no_content_response())
}

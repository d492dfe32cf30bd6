use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::common::{
    created_response, no_content_response, replayable_response, success_response,
    PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    services::{
        bom::CreateBomInput,
        production::ProduceInput,
        stock::{
            BalanceFilter, CreateItemInput, CreateWarehouseInput, ItemFilter, MovementFilter,
            MovementInput, UpdateItemInput, UpdateWarehouseInput,
        },
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct BomListQuery {
    pub item_id: Option<Uuid>,
}

/// `/stock` routes: catalogue, warehouses, the movement ledger, BOMs and
/// production.
pub fn stock_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/stock/items", get(list_items))
        .route("/stock/items/:id", get(get_item))
        .route("/stock/warehouses", get(list_warehouses))
        .route("/stock/balances", get(list_balances))
        .route("/stock/low-stock", get(low_stock))
        .route("/stock/movements", get(list_movements))
        .route("/stock/boms", get(list_boms))
        .route("/stock/boms/:id", get(get_bom));

    let write = Router::new()
        .route("/stock/items", post(create_item))
        .route("/stock/items/:id", put(update_item))
        .route("/stock/warehouses", post(create_warehouse))
        .route("/stock/warehouses/:id", put(update_warehouse))
        .route("/stock/movements", post(apply_movement))
        .route("/stock/boms", post(create_bom))
        .route("/stock/boms/:id", axum::routing::delete(delete_bom))
        .route("/stock/boms/:id/activar", post(activate_bom))
        .route("/stock/producir", post(produce))
        .with_write_access();

    read.merge(write)
}

async fn list_items(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ItemFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .stock
        .list_items(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.stock.get_item(id).await?;
    Ok(success_response(item))
}

async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.stock.create_item(payload).await?;
    info!(item_id = %item.id, sku = %item.sku, "Stock item created");
    Ok(created_response(item))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.stock.update_item(id, payload).await?;
    Ok(success_response(item))
}

async fn list_warehouses(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let warehouses = state.services.stock.list_warehouses().await?;
    Ok(success_response(warehouses))
}

async fn create_warehouse(
    State(state): State<AppState>,
    Json(payload): Json<CreateWarehouseInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.stock.create_warehouse(payload).await?;
    info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse created");
    Ok(created_response(warehouse))
}

async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWarehouseInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.stock.update_warehouse(id, payload).await?;
    Ok(success_response(warehouse))
}

async fn list_balances(
    State(state): State<AppState>,
    Query(filter): Query<BalanceFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let balances = state.services.stock.list_balances(&filter).await?;
    Ok(success_response(balances))
}

async fn low_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.stock.low_stock().await?;
    Ok(success_response(items))
}

async fn list_movements(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .stock
        .list_movements(&filter, pagination.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn apply_movement(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MovementInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .stock
        .apply_movement(payload, Some(user.user_id))
        .await?;
    let replayed = outcome.replayed;
    Ok(replayable_response(outcome, replayed))
}

async fn list_boms(
    State(state): State<AppState>,
    Query(query): Query<BomListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let boms = state.services.bom.list_boms(query.item_id).await?;
    Ok(success_response(boms))
}

async fn get_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let bom = state.services.bom.get_bom(id).await?;
    Ok(success_response(bom))
}

async fn create_bom(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBomInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let bom = state
        .services
        .bom
        .create_bom(payload, Some(user.user_id))
        .await?;
    info!(bom_id = %bom.bom.id, version = bom.bom.version, "BOM created");
    Ok(created_response(bom))
}

async fn activate_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let bom = state.services.bom.activate_bom(id).await?;
    Ok(success_response(bom))
}

async fn delete_bom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.bom.delete_bom(id).await?;
    info!(bom_id = %id, "BOM deleted");
    Ok(no_content_response())
}

async fn produce(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProduceInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .production
        .produce(payload, Some(user.user_id))
        .await?;
    let replayed = outcome.replayed;
    Ok(replayable_response(outcome, replayed))
}

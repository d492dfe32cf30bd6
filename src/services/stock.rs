//! Stock items, warehouses and the movement ledger.
//!
//! Every quantity change goes through [`apply_in_txn`], which updates the
//! affected balance rows and appends one ledger row per balance touched.
//! Balance updates are compare-and-swap on the previous quantities so two
//! writers racing on the same balance cannot both succeed.

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition,
    ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{lower_contains, map_unique_violation, normalize_search, Page, PageRequest};
use crate::{
    entities::{
        stock_balance, stock_item,
        stock_item::ItemKind,
        stock_movement, warehouse,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::ledger::{BalanceState, LedgerError, MovementKind},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 60))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub kind: ItemKind,
    pub min_stock: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub kind: Option<ItemKind>,
    pub min_stock: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub kind: Option<ItemKind>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWarehouseInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub branch_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MovementInput {
    pub kind: MovementKind,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    /// Destination of a transfer.
    pub to_warehouse_id: Option<Uuid>,
    pub quantity: Decimal,
    #[validate(length(max = 120))]
    pub reference: Option<String>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceFilter {
    pub item_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub item_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
}

/// An item whose on-hand total across warehouses is below its minimum.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    #[serde(flatten)]
    pub item: stock_item::Model,
    pub on_hand: Decimal,
    pub shortfall: Decimal,
}

/// Ledger rows written by one movement request.
#[derive(Debug, Clone, Serialize)]
pub struct MovementOutcome {
    pub movements: Vec<stock_movement::Model>,
    /// True when an earlier request with the same idempotency key was found.
    pub replayed: bool,
}

/// One balance change to apply inside a caller's transaction.
#[derive(Debug, Clone)]
pub(crate) struct MovementRequest {
    pub kind: MovementKind,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub to_warehouse_id: Option<Uuid>,
    pub quantity: Decimal,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub batch_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub created_by: Option<Uuid>,
}

fn ledger_error(item: &stock_item::Model, err: LedgerError) -> ServiceError {
    match err {
        LedgerError::NonPositiveQuantity(_) | LedgerError::ZeroAdjustment => {
            ServiceError::ValidationError(err.to_string())
        }
        LedgerError::OutOfRange => {
            ServiceError::ValidationError(format!("{} ({}): {}", item.sku, item.name, err))
        }
        LedgerError::InsufficientAvailable { .. }
        | LedgerError::InsufficientReserved { .. }
        | LedgerError::AdjustmentBelowReserved { .. } => {
            ServiceError::InsufficientStock(format!("{} ({}): {}", item.sku, item.name, err))
        }
    }
}

async fn find_item<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<stock_item::Model, ServiceError> {
    stock_item::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Stock item", id))
}

async fn find_warehouse<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Warehouse", id))
}

/// Stores `next` as the balance of (item, warehouse) if it still equals
/// `previous`.
async fn swap_balance<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    warehouse_id: Uuid,
    previous: Option<&stock_balance::Model>,
    next: BalanceState,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    match previous {
        Some(prev) => {
            let result = stock_balance::Entity::update_many()
                .col_expr(stock_balance::Column::OnHand, Expr::value(next.on_hand))
                .col_expr(stock_balance::Column::Reserved, Expr::value(next.reserved))
                .col_expr(stock_balance::Column::UpdatedAt, Expr::value(now))
                .filter(stock_balance::Column::Id.eq(prev.id))
                .filter(stock_balance::Column::OnHand.eq(prev.on_hand))
                .filter(stock_balance::Column::Reserved.eq(prev.reserved))
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;
            if result.rows_affected != 1 {
                warn!(%item_id, %warehouse_id, "Balance changed concurrently");
                return Err(ServiceError::Conflict(
                    "Stock balance changed concurrently, retry the movement".to_string(),
                ));
            }
        }
        None => {
            stock_balance::ActiveModel {
                id: Set(Uuid::new_v4()),
                item_id: Set(item_id),
                warehouse_id: Set(warehouse_id),
                on_hand: Set(next.on_hand),
                reserved: Set(next.reserved),
                updated_at: Set(now),
            }
            .insert(conn)
            .await
            .map_err(|e| {
                map_unique_violation(e, "Stock balance changed concurrently, retry the movement")
            })?;
        }
    }
    Ok(())
}

async fn load_balance<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Option<stock_balance::Model>, ServiceError> {
    stock_balance::Entity::find()
        .filter(stock_balance::Column::ItemId.eq(item_id))
        .filter(stock_balance::Column::WarehouseId.eq(warehouse_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Applies one movement and returns the ledger rows written: one for the
/// source balance, plus one for the destination of a transfer.
pub(crate) async fn apply_in_txn<C>(
    conn: &C,
    request: MovementRequest,
) -> Result<Vec<stock_movement::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    let item = find_item(conn, request.item_id).await?;
    find_warehouse(conn, request.warehouse_id).await?;

    let destination = match (request.kind, request.to_warehouse_id) {
        (MovementKind::Transfer, None) => {
            return Err(ServiceError::ValidationError(
                "Transfers need a destination warehouse".to_string(),
            ))
        }
        (MovementKind::Transfer, Some(to)) if to == request.warehouse_id => {
            return Err(ServiceError::ValidationError(
                "Transfer destination must differ from the source".to_string(),
            ))
        }
        (MovementKind::Transfer, Some(to)) => Some(find_warehouse(conn, to).await?.id),
        (_, Some(_)) => {
            return Err(ServiceError::ValidationError(format!(
                "Only transfers take a destination warehouse, got {}",
                request.kind
            )))
        }
        (_, None) => None,
    };

    let previous = load_balance(conn, item.id, request.warehouse_id).await?;
    let before = previous
        .as_ref()
        .map(stock_balance::Model::state)
        .unwrap_or_default();
    let after = before
        .apply(request.kind, request.quantity)
        .map_err(|e| ledger_error(&item, e))?;
    swap_balance(conn, item.id, request.warehouse_id, previous.as_ref(), after).await?;

    let now = Utc::now();
    let mut rows = Vec::with_capacity(2);
    rows.push(
        stock_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(request.kind.to_string()),
            item_id: Set(item.id),
            warehouse_id: Set(request.warehouse_id),
            to_warehouse_id: Set(destination),
            quantity: Set(request.quantity),
            on_hand_after: Set(after.on_hand),
            reserved_after: Set(after.reserved),
            reference: Set(request.reference.clone()),
            reason: Set(request.reason.clone()),
            batch_id: Set(request.batch_id),
            idempotency_key: Set(request.idempotency_key.clone()),
            created_by: Set(request.created_by),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| map_unique_violation(e, "Idempotency key already used"))?,
    );

    if let Some(to) = destination {
        let previous = load_balance(conn, item.id, to).await?;
        let before = previous
            .as_ref()
            .map(stock_balance::Model::state)
            .unwrap_or_default();
        let after = before
            .receive(request.quantity)
            .map_err(|e| ledger_error(&item, e))?;
        swap_balance(conn, item.id, to, previous.as_ref(), after).await?;

        rows.push(
            stock_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                kind: Set(MovementKind::Transfer.to_string()),
                item_id: Set(item.id),
                warehouse_id: Set(to),
                to_warehouse_id: Set(Some(to)),
                quantity: Set(request.quantity),
                on_hand_after: Set(after.on_hand),
                reserved_after: Set(after.reserved),
                reference: Set(request.reference),
                reason: Set(request.reason),
                batch_id: Set(request.batch_id),
                idempotency_key: Set(None),
                created_by: Set(request.created_by),
                created_at: Set(now),
            }
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)?,
        );
    }

    debug!(
        item_id = %item.id,
        kind = %request.kind,
        quantity = %request.quantity,
        "Movement applied"
    );
    Ok(rows)
}

/// Total on-hand quantity of an item across all warehouses.
pub(crate) async fn total_on_hand<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let balances = stock_balance::Entity::find()
        .filter(stock_balance::Column::ItemId.eq(item_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(balances.iter().map(|b| b.on_hand).sum())
}

#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    // Items

    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<Page<stock_item::Model>, ServiceError> {
        let mut query = stock_item::Entity::find().order_by_asc(stock_item::Column::Sku);
        if let Some(needle) = normalize_search(filter.search.as_deref()) {
            query = query.filter(
                Condition::any()
                    .add(lower_contains(stock_item::Column::Sku, &needle))
                    .add(lower_contains(stock_item::Column::Name, &needle)),
            );
        }
        if let Some(kind) = filter.kind {
            query = query.filter(stock_item::Column::Kind.eq(kind));
        }
        if let Some(active) = filter.active {
            query = query.filter(stock_item::Column::Active.eq(active));
        }

        let paginator = query.paginate(&*self.db, page.per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, id: Uuid) -> Result<stock_item::Model, ServiceError> {
        find_item(&*self.db, id).await
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<stock_item::Model, ServiceError> {
        input.validate()?;
        let min_stock = input.min_stock.unwrap_or(Decimal::ZERO);
        if min_stock < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Minimum stock cannot be negative".to_string(),
            ));
        }
        let sku = input.sku.trim().to_uppercase();
        let taken = stock_item::Entity::find()
            .filter(stock_item::Column::Sku.eq(sku.as_str()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!("SKU {} already exists", sku)));
        }

        let now = Utc::now();
        let created = stock_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.clone()),
            name: Set(input.name.trim().to_string()),
            unit: Set(input.unit.trim().to_string()),
            kind: Set(input.kind),
            min_stock: Set(min_stock),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| map_unique_violation(e, format!("SKU {} already exists", sku)))?;

        info!(item_id = %created.id, sku = %created.sku, "Stock item created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: UpdateItemInput,
    ) -> Result<stock_item::Model, ServiceError> {
        input.validate()?;
        let mut model: stock_item::ActiveModel = self.get_item(id).await?.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(unit) = input.unit {
            model.unit = Set(unit.trim().to_string());
        }
        if let Some(kind) = input.kind {
            model.kind = Set(kind);
        }
        if let Some(min_stock) = input.min_stock {
            if min_stock < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Minimum stock cannot be negative".to_string(),
                ));
            }
            model.min_stock = Set(min_stock);
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    // Warehouses

    #[instrument(skip(self))]
    pub async fn list_warehouses(&self) -> Result<Vec<warehouse::Model>, ServiceError> {
        warehouse::Entity::find()
            .order_by_asc(warehouse::Column::Code)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_warehouse(
        &self,
        input: CreateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let code = input.code.trim().to_uppercase();
        let now = Utc::now();
        let created = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
            branch_id: Set(input.branch_id),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| map_unique_violation(e, format!("Warehouse code {} already exists", code)))?;

        info!(warehouse_id = %created.id, code = %created.code, "Warehouse created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_warehouse(
        &self,
        id: Uuid,
        input: UpdateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;
        let mut model: warehouse::ActiveModel = find_warehouse(&*self.db, id).await?.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if input.branch_id.is_some() {
            model.branch_id = Set(input.branch_id);
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    // Balances and ledger

    #[instrument(skip(self))]
    pub async fn list_balances(
        &self,
        filter: &BalanceFilter,
    ) -> Result<Vec<stock_balance::Model>, ServiceError> {
        let mut query = stock_balance::Entity::find();
        if let Some(item_id) = filter.item_id {
            query = query.filter(stock_balance::Column::ItemId.eq(item_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_balance::Column::WarehouseId.eq(warehouse_id));
        }
        query
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Active items whose on-hand total is below their minimum.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<LowStockItem>, ServiceError> {
        let items = stock_item::Entity::find()
            .filter(stock_item::Column::Active.eq(true))
            .order_by_asc(stock_item::Column::Sku)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let balances = stock_balance::Entity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for balance in balances {
            *totals.entry(balance.item_id).or_default() += balance.on_hand;
        }

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let on_hand = totals.get(&item.id).copied().unwrap_or_default();
                (on_hand < item.min_stock).then(|| LowStockItem {
                    shortfall: item.min_stock - on_hand,
                    on_hand,
                    item,
                })
            })
            .collect())
    }

    /// Ledger rows, newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<stock_movement::Model>, ServiceError> {
        let mut query = stock_movement::Entity::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id);
        if let Some(item_id) = filter.item_id {
            query = query.filter(stock_movement::Column::ItemId.eq(item_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_movement::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(stock_movement::Column::Kind.eq(kind.as_ref()));
        }

        let paginator = query.paginate(&*self.db, page.per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Page::new(items, total, page))
    }

    async fn replay(&self, input: &MovementInput, key: &str) -> Result<Option<MovementOutcome>, ServiceError> {
        let Some(original) = stock_movement::Entity::find()
            .filter(stock_movement::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };

        if original.item_id != input.item_id
            || original.warehouse_id != input.warehouse_id
            || original.to_warehouse_id != input.to_warehouse_id
            || original.kind != input.kind.as_ref()
            || original.quantity != input.quantity
        {
            return Err(ServiceError::Conflict(format!(
                "Idempotency key {} was used for a different movement",
                key
            )));
        }

        let mut movements = vec![original.clone()];
        if let (Some(to), Some(batch_id)) = (original.to_warehouse_id, original.batch_id) {
            movements.extend(
                stock_movement::Entity::find()
                    .filter(stock_movement::Column::BatchId.eq(batch_id))
                    .filter(stock_movement::Column::WarehouseId.eq(to))
                    .all(&*self.db)
                    .await
                    .map_err(ServiceError::db_error)?,
            );
        }
        info!(idempotency_key = key, "Replaying stock movement");
        Ok(Some(MovementOutcome {
            movements,
            replayed: true,
        }))
    }

    /// Validates and applies one movement atomically.
    #[instrument(skip(self, input), fields(kind = %input.kind, item_id = %input.item_id))]
    pub async fn apply_movement(
        &self,
        input: MovementInput,
        created_by: Option<Uuid>,
    ) -> Result<MovementOutcome, ServiceError> {
        input.validate()?;
        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(outcome) = self.replay(&input, key).await? {
                return Ok(outcome);
            }
        }

        let kind = input.kind;
        // Both legs of a transfer share a batch id.
        let batch_id = (kind == MovementKind::Transfer).then(Uuid::new_v4);
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let movements = apply_in_txn(
            &txn,
            MovementRequest {
                kind,
                item_id: input.item_id,
                warehouse_id: input.warehouse_id,
                to_warehouse_id: input.to_warehouse_id,
                quantity: input.quantity,
                reference: input.reference,
                reason: input.reason,
                batch_id,
                idempotency_key: input.idempotency_key,
                created_by,
            },
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("aberturas_stock.movements", 1, "kind" => kind.to_string());
        info!(
            item_id = %input.item_id,
            warehouse_id = %input.warehouse_id,
            %kind,
            quantity = %input.quantity,
            "Stock movement recorded"
        );
        self.after_movements(&movements).await;
        Ok(MovementOutcome {
            movements,
            replayed: false,
        })
    }

    /// Publishes movement events and warns when an item dropped below its
    /// minimum.
    pub(crate) async fn after_movements(&self, movements: &[stock_movement::Model]) {
        let mut checked = Vec::new();
        for movement in movements {
            self.event_sender
                .send_or_log(Event::StockMoved {
                    movement_id: movement.id,
                    item_id: movement.item_id,
                    warehouse_id: movement.warehouse_id,
                    kind: movement.kind.clone(),
                    quantity: movement.quantity,
                })
                .await;
            if !checked.contains(&movement.item_id) {
                checked.push(movement.item_id);
            }
        }

        for item_id in checked {
            if let Err(e) = self.check_low_stock(item_id).await {
                warn!(%item_id, error = %e, "Low stock check failed");
            }
        }
    }

    async fn check_low_stock(&self, item_id: Uuid) -> Result<(), ServiceError> {
        let item = find_item(&*self.db, item_id).await?;
        if item.min_stock <= Decimal::ZERO {
            return Ok(());
        }
        let on_hand = total_on_hand(&*self.db, item_id).await?;
        if on_hand < item.min_stock {
            warn!(sku = %item.sku, %on_hand, min_stock = %item.min_stock, "Item below minimum stock");
            self.event_sender
                .send_or_log(Event::LowStock {
                    item_id,
                    on_hand,
                    min_stock: item.min_stock,
                })
                .await;
        }
        Ok(())
    }
}

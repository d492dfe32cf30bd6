use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait,
    DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{bom, bom_line, stock_item},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BomLineInput {
    pub component_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBomInput {
    pub item_id: Uuid,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub lines: Vec<BomLineInput>,
    /// Make this version the active one right away.
    #[serde(default)]
    pub activate: bool,
}

/// A BOM version with its component lines.
#[derive(Debug, Clone, Serialize)]
pub struct BomWithLines {
    #[serde(flatten)]
    pub bom: bom::Model,
    pub lines: Vec<bom_line::Model>,
}

/// The active BOM of `item_id`, if any.
pub(crate) async fn active_bom<C>(conn: &C, item_id: Uuid) -> Result<Option<BomWithLines>, ServiceError>
where
    C: ConnectionTrait,
{
    let Some(found) = bom::Entity::find()
        .filter(bom::Column::ItemId.eq(item_id))
        .filter(bom::Column::Active.eq(true))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(None);
    };
    let lines = found
        .find_related(bom_line::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(Some(BomWithLines { bom: found, lines }))
}

/// Marks `bom_id` active and every other version of the item inactive.
async fn activate_in_txn<C>(conn: &C, bom_id: Uuid, item_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    bom::Entity::update_many()
        .col_expr(bom::Column::Active, Expr::value(false))
        .col_expr(bom::Column::UpdatedAt, Expr::value(now))
        .filter(bom::Column::ItemId.eq(item_id))
        .filter(bom::Column::Id.ne(bom_id))
        .filter(bom::Column::Active.eq(true))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    bom::Entity::update_many()
        .col_expr(bom::Column::Active, Expr::value(true))
        .col_expr(bom::Column::UpdatedAt, Expr::value(now))
        .filter(bom::Column::Id.eq(bom_id))
        .exec(conn)
        .await
        .map_err(|e| {
            super::map_unique_violation(e, "Another BOM version of this item was activated concurrently")
        })?;
    Ok(())
}

fn check_lines(item_id: Uuid, lines: &[BomLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "A BOM needs at least one line".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for line in lines {
        line.validate()?;
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Quantity of component {} must be greater than zero",
                line.component_id
            )));
        }
        if line.component_id == item_id {
            return Err(ServiceError::ValidationError(
                "An item cannot be a component of itself".to_string(),
            ));
        }
        if !seen.insert(line.component_id) {
            return Err(ServiceError::ValidationError(format!(
                "Component {} is listed twice",
                line.component_id
            )));
        }
    }
    Ok(())
}

/// Versioned bills of materials.
#[derive(Clone)]
pub struct BomService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl BomService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_boms(&self, item_id: Option<Uuid>) -> Result<Vec<bom::Model>, ServiceError> {
        let mut query = bom::Entity::find()
            .order_by_asc(bom::Column::ItemId)
            .order_by_desc(bom::Column::Version);
        if let Some(item_id) = item_id {
            query = query.filter(bom::Column::ItemId.eq(item_id));
        }
        query.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_bom(&self, id: Uuid) -> Result<BomWithLines, ServiceError> {
        let found = bom::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("BOM", id))?;
        let lines = found
            .find_related(bom_line::Entity)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(BomWithLines { bom: found, lines })
    }

    /// Creates the next version of an item's BOM.
    #[instrument(skip(self, input), fields(item_id = %input.item_id))]
    pub async fn create_bom(
        &self,
        input: CreateBomInput,
        created_by: Option<Uuid>,
    ) -> Result<BomWithLines, ServiceError> {
        input.validate()?;
        check_lines(input.item_id, &input.lines)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let item = stock_item::Entity::find_by_id(input.item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Stock item", input.item_id))?;

        let component_ids: Vec<Uuid> = input.lines.iter().map(|l| l.component_id).collect();
        let found: HashSet<Uuid> = stock_item::Entity::find()
            .filter(stock_item::Column::Id.is_in(component_ids.clone()))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if let Some(missing) = component_ids.iter().find(|id| !found.contains(id)) {
            return Err(ServiceError::not_found("Component", missing));
        }

        let latest: Option<Option<i32>> = bom::Entity::find()
            .select_only()
            .column_as(bom::Column::Version.max(), "max")
            .filter(bom::Column::ItemId.eq(item.id))
            .into_tuple()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let version = latest.flatten().unwrap_or(0) + 1;

        let now = Utc::now();
        let created = bom::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            version: Set(version),
            name: Set(input
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| format!("{} v{}", item.sku, version))),
            notes: Set(input.notes),
            active: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| super::map_unique_violation(e, "BOM version already exists, retry"))?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            lines.push(
                bom_line::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    bom_id: Set(created.id),
                    component_id: Set(line.component_id),
                    quantity: Set(line.quantity),
                    notes: Set(line.notes),
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::db_error)?,
            );
        }

        if input.activate {
            activate_in_txn(&txn, created.id, item.id).await?;
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(bom_id = %created.id, sku = %item.sku, version, "BOM created");
        if input.activate {
            self.event_sender
                .send_or_log(Event::BomActivated {
                    bom_id: created.id,
                    item_id: item.id,
                })
                .await;
            return self.get_bom(created.id).await;
        }
        Ok(BomWithLines {
            bom: created,
            lines,
        })
    }

    /// Makes a version the item's only active BOM.
    #[instrument(skip(self))]
    pub async fn activate_bom(&self, id: Uuid) -> Result<BomWithLines, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let found = bom::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("BOM", id))?;
        activate_in_txn(&txn, found.id, found.item_id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(bom_id = %id, item_id = %found.item_id, version = found.version, "BOM activated");
        self.event_sender
            .send_or_log(Event::BomActivated {
                bom_id: id,
                item_id: found.item_id,
            })
            .await;
        self.get_bom(id).await
    }

    /// Deletes an inactive BOM version with its lines.
    #[instrument(skip(self))]
    pub async fn delete_bom(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let found = bom::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("BOM", id))?;
        if found.active {
            return Err(ServiceError::InvalidOperation(
                "The active BOM cannot be deleted, activate another version first".to_string(),
            ));
        }
        bom_line::Entity::delete_many()
            .filter(bom_line::Column::BomId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        found.delete(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        info!(bom_id = %id, "BOM deleted");
        Ok(())
    }
}

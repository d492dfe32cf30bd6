use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only stock ledger entry. `on_hand_after`/`reserved_after` are the
/// balance of (`item_id`, `warehouse_id`) once the movement was applied.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    #[sea_orm(nullable)]
    pub to_warehouse_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub on_hand_after: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub reserved_after: Decimal,
    #[sea_orm(nullable)]
    pub reference: Option<String>,
    #[sea_orm(nullable)]
    pub reason: Option<String>,
    #[sea_orm(nullable)]
    pub batch_id: Option<Uuid>,
    #[sea_orm(nullable, unique)]
    pub idempotency_key: Option<String>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_item::Entity",
        from = "Column::ItemId",
        to = "super::stock_item::Column::Id"
    )]
    Item,
}

impl Related<super::stock_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub number: i64,
    pub customer_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub lines: QuoteLines,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(nullable)]
    pub valid_until: Option<NaiveDate>,
    pub stage: QuoteStage,
    #[sea_orm(nullable)]
    pub assigned_to: Option<Uuid>,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Priced line of a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl QuoteLine {
    /// `quantity * unit_price`, or `None` on overflow.
    pub fn total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct QuoteLines(pub Vec<QuoteLine>);

impl QuoteLines {
    /// Sum of the line totals, or `None` on overflow.
    pub fn total(&self) -> Option<Decimal> {
        self.0
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.total()?))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::quote_stage_change::Entity")]
    StageChanges,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::quote_stage_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StageChanges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Sales pipeline stage of a quote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStage {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "negotiation")]
    Negotiation,
    #[sea_orm(string_value = "won")]
    Won,
    #[sea_orm(string_value = "lost")]
    Lost,
}

impl QuoteStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStage::Draft => "draft",
            QuoteStage::Sent => "sent",
            QuoteStage::Negotiation => "negotiation",
            QuoteStage::Won => "won",
            QuoteStage::Lost => "lost",
        }
    }
}

impl std::fmt::Display for QuoteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

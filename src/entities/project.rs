use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::project_workflow::ProjectStage;

/// Fulfillment project. `current_stage` holds a [`ProjectStage`] name and
/// each operational stage owns one JSON detail document (`{}` when empty).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: i64,
    pub customer_id: Uuid,
    #[sea_orm(nullable, unique)]
    pub quote_id: Option<Uuid>,
    pub title: String,
    #[sea_orm(nullable)]
    pub address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub current_stage: String,
    #[sea_orm(column_type = "Json")]
    pub technical_visit: Json,
    #[sea_orm(column_type = "Json")]
    pub measurement: Json,
    #[sea_orm(column_type = "Json")]
    pub verification: Json,
    #[sea_orm(column_type = "Json")]
    pub workshop: Json,
    #[sea_orm(column_type = "Json")]
    pub warehouse: Json,
    #[sea_orm(column_type = "Json")]
    pub logistics: Json,
    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn stage(&self) -> Option<ProjectStage> {
        self.current_stage.parse().ok()
    }

    pub fn detail(&self, stage: ProjectStage) -> Option<&Json> {
        match stage {
            ProjectStage::TechnicalVisit => Some(&self.technical_visit),
            ProjectStage::Measurement => Some(&self.measurement),
            ProjectStage::Verification => Some(&self.verification),
            ProjectStage::Workshop => Some(&self.workshop),
            ProjectStage::Warehouse => Some(&self.warehouse),
            ProjectStage::Logistics => Some(&self.logistics),
            ProjectStage::Completed | ProjectStage::Cancelled => None,
        }
    }
}

impl ActiveModel {
    /// Sets the detail column for `stage`. Terminal stages have no column.
    pub fn set_detail(&mut self, stage: ProjectStage, document: Json) -> bool {
        use sea_orm::ActiveValue::Set;
        match stage {
            ProjectStage::TechnicalVisit => self.technical_visit = Set(document),
            ProjectStage::Measurement => self.measurement = Set(document),
            ProjectStage::Verification => self.verification = Set(document),
            ProjectStage::Workshop => self.workshop = Set(document),
            ProjectStage::Warehouse => self.warehouse = Set(document),
            ProjectStage::Logistics => self.logistics = Set(document),
            ProjectStage::Completed | ProjectStage::Cancelled => return false,
        }
        true
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
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

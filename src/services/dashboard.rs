use chrono::Utc;
use sea_orm::{
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::instrument;

use super::{
    stock::StockService,
    tasks::{open_condition, overdue_condition},
};
use crate::{
    entities::{project, quote, task},
    errors::ServiceError,
    models::project_workflow::ProjectStage,
};

/// Headline counters for the home screen.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub quotes_by_stage: BTreeMap<String, u64>,
    pub projects_by_stage: BTreeMap<String, u64>,
    pub open_tasks: u64,
    pub overdue_tasks: u64,
    pub low_stock_items: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
    stock: StockService,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>, stock: StockService) -> Self {
        Self { db, stock }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;

        let quote_stages: Vec<quote::QuoteStage> = quote::Entity::find()
            .select_only()
            .column(quote::Column::Stage)
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut quotes_by_stage: BTreeMap<String, u64> = BTreeMap::new();
        for stage in quote_stages {
            *quotes_by_stage.entry(stage.to_string()).or_default() += 1;
        }

        let project_stages: Vec<String> = project::Entity::find()
            .select_only()
            .column(project::Column::CurrentStage)
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut projects_by_stage: BTreeMap<String, u64> =
            ProjectStage::iter().map(|s| (s.to_string(), 0)).collect();
        for stage in project_stages {
            *projects_by_stage.entry(stage).or_default() += 1;
        }

        let open_tasks = task::Entity::find()
            .filter(open_condition())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let overdue_tasks = task::Entity::find()
            .filter(overdue_condition(Utc::now()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let low_stock_items = self.stock.low_stock().await?.len() as u64;

        Ok(DashboardSummary {
            quotes_by_stage,
            projects_by_stage,
            open_tasks,
            overdue_tasks,
            low_stock_items,
        })
    }
}

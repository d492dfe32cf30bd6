use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::user,
    entities::{branch, customer, warehouse},
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranchInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBranchInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct BranchService {
    db: Arc<DatabaseConnection>,
}

impl BranchService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_branches(&self) -> Result<Vec<branch::Model>, ServiceError> {
        branch::Entity::find()
            .order_by_asc(branch::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_branch(&self, id: Uuid) -> Result<branch::Model, ServiceError> {
        branch::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Branch", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_branch(
        &self,
        input: CreateBranchInput,
    ) -> Result<branch::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let created = branch::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            address: Set(input.address),
            city: Set(input.city),
            phone: Set(input.phone),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(branch_id = %created.id, "Branch created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_branch(
        &self,
        id: Uuid,
        input: UpdateBranchInput,
    ) -> Result<branch::Model, ServiceError> {
        input.validate()?;
        let mut model: branch::ActiveModel = self.get_branch(id).await?.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if input.address.is_some() {
            model.address = Set(input.address);
        }
        if input.city.is_some() {
            model.city = Set(input.city);
        }
        if input.phone.is_some() {
            model.phone = Set(input.phone);
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Deletes a branch nobody references any more.
    #[instrument(skip(self))]
    pub async fn delete_branch(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get_branch(id).await?;
        let db = &*self.db;

        let users = user::Entity::find()
            .filter(user::Column::BranchId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let customers = customer::Entity::find()
            .filter(customer::Column::BranchId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let warehouses = warehouse::Entity::find()
            .filter(warehouse::Column::BranchId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if users + customers + warehouses > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Branch is still referenced by {} users, {} customers and {} warehouses",
                users, customers, warehouses
            )));
        }

        existing.delete(db).await.map_err(ServiceError::db_error)?;
        info!(branch_id = %id, "Branch deleted");
        Ok(())
    }
}

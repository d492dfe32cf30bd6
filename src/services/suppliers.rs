use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{lower_contains, normalize_search, Page, PageRequest};
use crate::{entities::supplier, errors::ServiceError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    #[validate(length(max = 120))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 80))]
    pub category: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    #[validate(length(max = 120))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 80))]
    pub category: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<supplier::Model>, ServiceError> {
        let mut query = supplier::Entity::find().order_by_asc(supplier::Column::Name);
        if let Some(needle) = normalize_search(search) {
            query = query.filter(
                Condition::any()
                    .add(lower_contains(supplier::Column::Name, &needle))
                    .add(lower_contains(supplier::Column::ContactName, &needle))
                    .add(lower_contains(supplier::Column::TaxId, &needle)),
            );
        }
        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            query = query.filter(supplier::Column::Category.eq(category));
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
    pub async fn get_supplier(&self, id: Uuid) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Supplier", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_supplier(
        &self,
        input: CreateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let created = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            tax_id: Set(input.tax_id),
            contact_name: Set(input.contact_name),
            email: Set(input.email.map(|e| e.trim().to_lowercase())),
            phone: Set(input.phone),
            address: Set(input.address),
            category: Set(input.category),
            notes: Set(input.notes),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(supplier_id = %created.id, "Supplier created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_supplier(
        &self,
        id: Uuid,
        input: UpdateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;
        let mut model: supplier::ActiveModel = self.get_supplier(id).await?.into();
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if input.tax_id.is_some() {
            model.tax_id = Set(input.tax_id);
        }
        if input.contact_name.is_some() {
            model.contact_name = Set(input.contact_name);
        }
        if let Some(email) = input.email {
            model.email = Set(Some(email.trim().to_lowercase()));
        }
        if input.phone.is_some() {
            model.phone = Set(input.phone);
        }
        if input.address.is_some() {
            model.address = Set(input.address);
        }
        if input.category.is_some() {
            model.category = Set(input.category);
        }
        if input.notes.is_some() {
            model.notes = Set(input.notes);
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(supplier_id = %id, "Supplier updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_supplier(id)
            .await?
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(supplier_id = %id, "Supplier deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool;

    fn input(name: &str, category: &str) -> CreateSupplierInput {
        CreateSupplierInput {
            name: name.to_string(),
            tax_id: None,
            contact_name: Some("Raúl".to_string()),
            email: Some("Ventas@Perfiles.com".to_string()),
            phone: None,
            address: None,
            category: Some(category.to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn search_and_category_filter() {
        let suppliers = SupplierService::new(Arc::new(migrated_memory_pool().await));
        let created = suppliers
            .create_supplier(input("Perfiles del Sur", "aluminio"))
            .await
            .unwrap();
        assert_eq!(created.email.as_deref(), Some("ventas@perfiles.com"));
        suppliers
            .create_supplier(input("Cristales Litoral", "vidrio"))
            .await
            .unwrap();

        let by_name = suppliers
            .list_suppliers(Some("cristal"), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_name.total, 1);

        let by_category = suppliers
            .list_suppliers(None, Some("aluminio"), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_category.items[0].id, created.id);
    }

    #[tokio::test]
    async fn deactivate_then_delete() {
        let suppliers = SupplierService::new(Arc::new(migrated_memory_pool().await));
        let created = suppliers
            .create_supplier(input("Herrajes Centro", "herrajes"))
            .await
            .unwrap();
        let updated = suppliers
            .update_supplier(
                created.id,
                UpdateSupplierInput {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);

        suppliers.delete_supplier(created.id).await.unwrap();
        assert!(suppliers.get_supplier(created.id).await.is_err());
    }
}

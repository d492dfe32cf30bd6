use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{lower_contains, normalize_search, Page, PageRequest};
use crate::{
    entities::{
        customer::{self, CustomerKind},
        project, quote,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerInput {
    pub kind: CustomerKind,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
    pub branch_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCustomerInput {
    pub kind: Option<CustomerKind>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 120))]
    pub city: Option<String>,
    pub branch_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub kind: Option<CustomerKind>,
    pub branch_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

/// One row of the customer CSV export.
#[derive(Debug, Serialize)]
struct CustomerCsvRow<'a> {
    id: Uuid,
    kind: &'static str,
    name: &'a str,
    tax_id: &'a str,
    email: &'a str,
    phone: &'a str,
    address: &'a str,
    city: &'a str,
    created_at: String,
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn filtered(filter: &CustomerFilter) -> Select<customer::Entity> {
        let mut query = customer::Entity::find();
        if let Some(needle) = normalize_search(filter.search.as_deref()) {
            query = query.filter(
                Condition::any()
                    .add(lower_contains(customer::Column::Name, &needle))
                    .add(lower_contains(customer::Column::Email, &needle))
                    .add(lower_contains(customer::Column::TaxId, &needle)),
            );
        }
        if let Some(kind) = filter.kind {
            query = query.filter(customer::Column::Kind.eq(kind));
        }
        if let Some(branch_id) = filter.branch_id {
            query = query.filter(customer::Column::BranchId.eq(branch_id));
        }
        if let Some(assigned_to) = filter.assigned_to {
            query = query.filter(customer::Column::AssignedTo.eq(assigned_to));
        }
        query
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<customer::Model>, ServiceError> {
        let paginator = Self::filtered(filter)
            .order_by_asc(customer::Column::Name)
            .paginate(&*self.db, page.per_page);
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
    pub async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_customer(
        &self,
        input: CreateCustomerInput,
        created_by: Option<Uuid>,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let created = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            kind: Set(input.kind),
            name: Set(input.name.trim().to_string()),
            tax_id: Set(input.tax_id),
            email: Set(input.email.map(|e| e.trim().to_lowercase())),
            phone: Set(input.phone),
            address: Set(input.address),
            city: Set(input.city),
            branch_id: Set(input.branch_id),
            assigned_to: Set(input.assigned_to.or(created_by)),
            notes: Set(input.notes),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!("Failed to create customer: {}", e);
            ServiceError::db_error(e)
        })?;

        info!(customer_id = %created.id, "Customer created");
        self.event_sender
            .send_or_log(Event::CustomerCreated(created.id))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_customer(
        &self,
        id: Uuid,
        input: UpdateCustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let mut model: customer::ActiveModel = self.get_customer(id).await?.into();

        if let Some(kind) = input.kind {
            model.kind = Set(kind);
        }
        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if input.tax_id.is_some() {
            model.tax_id = Set(input.tax_id);
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
        if input.city.is_some() {
            model.city = Set(input.city);
        }
        if input.branch_id.is_some() {
            model.branch_id = Set(input.branch_id);
        }
        if input.assigned_to.is_some() {
            model.assigned_to = Set(input.assigned_to);
        }
        if input.notes.is_some() {
            model.notes = Set(input.notes);
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(customer_id = %id, "Customer updated");
        Ok(updated)
    }

    /// Deletes a customer together with its notes and interactions. Customers
    /// with quotes or projects are kept.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get_customer(id).await?;
        let db = &*self.db;

        let quotes = existing
            .find_related(quote::Entity)
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let projects = existing
            .find_related(project::Entity)
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if quotes > 0 || projects > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Customer has {} quotes and {} projects and cannot be deleted",
                quotes, projects
            )));
        }

        existing.delete(db).await.map_err(ServiceError::db_error)?;
        info!(customer_id = %id, "Customer deleted");
        self.event_sender
            .send_or_log(Event::CustomerDeleted(id))
            .await;
        Ok(())
    }

    /// Renders every customer matching `filter` as CSV with a header row.
    #[instrument(skip(self))]
    pub async fn export_csv(&self, filter: &CustomerFilter) -> Result<String, ServiceError> {
        let customers = Self::filtered(filter)
            .order_by_asc(customer::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for c in &customers {
            writer
                .serialize(CustomerCsvRow {
                    id: c.id,
                    kind: match c.kind {
                        CustomerKind::Person => "person",
                        CustomerKind::Company => "company",
                    },
                    name: &c.name,
                    tax_id: c.tax_id.as_deref().unwrap_or_default(),
                    email: c.email.as_deref().unwrap_or_default(),
                    phone: c.phone.as_deref().unwrap_or_default(),
                    address: c.address.as_deref().unwrap_or_default(),
                    city: c.city.as_deref().unwrap_or_default(),
                    created_at: c.created_at.to_rfc3339(),
                })
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        }
        if customers.is_empty() {
            writer
                .write_record([
                    "id",
                    "kind",
                    "name",
                    "tax_id",
                    "email",
                    "phone",
                    "address",
                    "city",
                    "created_at",
                ])
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ServiceError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    async fn service() -> CustomerService {
        let (tx, _rx) = mpsc::channel(16);
        CustomerService::new(Arc::new(migrated_memory_pool().await), EventSender::new(tx))
    }

    fn input(name: &str, kind: CustomerKind) -> CreateCustomerInput {
        CreateCustomerInput {
            kind,
            name: name.to_string(),
            tax_id: None,
            email: None,
            phone: None,
            address: None,
            city: Some("Rosario".to_string()),
            branch_id: None,
            assigned_to: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_kind_filters() {
        let customers = service().await;
        customers
            .create_customer(input("Vidriería Norte", CustomerKind::Company), None)
            .await
            .unwrap();
        customers
            .create_customer(input("Juana Pérez", CustomerKind::Person), None)
            .await
            .unwrap();

        let filter = CustomerFilter {
            search: Some("NORTE".to_string()),
            ..Default::default()
        };
        let found = customers
            .list_customers(&filter, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].name, "Vidriería Norte");

        let people = customers
            .list_customers(
                &CustomerFilter {
                    kind: Some(CustomerKind::Person),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(people.total, 1);
    }

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let customers = service().await;
        let empty = customers.export_csv(&CustomerFilter::default()).await.unwrap();
        assert!(empty.starts_with("id,kind,name"));

        customers
            .create_customer(input("Obras, Reformas y Cía", CustomerKind::Company), None)
            .await
            .unwrap();
        let csv = customers.export_csv(&CustomerFilter::default()).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,kind,name,tax_id"));
        assert!(lines[1].contains("\"Obras, Reformas y Cía\""));
    }

    #[tokio::test]
    async fn missing_customer_is_not_found() {
        let customers = service().await;
        assert_matches!(
            customers.delete_customer(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        customer,
        interaction::{self, InteractionKind},
        note,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNoteInput {
    #[validate(length(min = 1, max = 4000))]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInteractionInput {
    pub kind: InteractionKind,
    #[validate(length(min = 1, max = 4000))]
    pub summary: String,
    /// Defaults to now.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Notes and interactions hanging off a customer.
#[derive(Clone)]
pub struct ActivityService {
    db: Arc<DatabaseConnection>,
}

impl ActivityService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_customer(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(customer_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_id))
    }

    #[instrument(skip(self))]
    pub async fn list_notes(&self, customer_id: Uuid) -> Result<Vec<note::Model>, ServiceError> {
        self.ensure_customer(customer_id)
            .await?
            .find_related(note::Entity)
            .order_by_desc(note::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input))]
    pub async fn add_note(
        &self,
        customer_id: Uuid,
        input: CreateNoteInput,
        author_id: Option<Uuid>,
    ) -> Result<note::Model, ServiceError> {
        input.validate()?;
        self.ensure_customer(customer_id).await?;

        let created = note::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            author_id: Set(author_id),
            body: Set(input.body.trim().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(customer_id = %customer_id, note_id = %created.id, "Note added");
        Ok(created)
    }

    /// Deletes a note. The note must belong to `customer_id`.
    #[instrument(skip(self))]
    pub async fn delete_note(&self, customer_id: Uuid, note_id: Uuid) -> Result<(), ServiceError> {
        let existing = note::Entity::find_by_id(note_id)
            .filter(note::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Note", note_id))?;
        existing
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(customer_id = %customer_id, note_id = %note_id, "Note deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_interactions(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<interaction::Model>, ServiceError> {
        self.ensure_customer(customer_id)
            .await?
            .find_related(interaction::Entity)
            .order_by_desc(interaction::Column::OccurredAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input))]
    pub async fn add_interaction(
        &self,
        customer_id: Uuid,
        input: CreateInteractionInput,
        user_id: Option<Uuid>,
    ) -> Result<interaction::Model, ServiceError> {
        input.validate()?;
        self.ensure_customer(customer_id).await?;

        let now = Utc::now();
        let created = interaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            user_id: Set(user_id),
            kind: Set(input.kind),
            summary: Set(input.summary.trim().to_string()),
            occurred_at: Set(input.occurred_at.unwrap_or(now)),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(customer_id = %customer_id, kind = ?created.kind, "Interaction logged");
        Ok(created)
    }
}

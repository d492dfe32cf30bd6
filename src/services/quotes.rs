use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{
    lower_contains, normalize_search,
    projects::{insert_project, NewProject},
    sequences::{next_value, QUOTE_NUMBER},
    Page, PageRequest,
};
use crate::{
    entities::{
        customer, project,
        quote::{self, QuoteLine, QuoteLines, QuoteStage},
        quote_stage_change,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::within_storage,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuoteLineInput {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuoteInput {
    pub customer_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[serde(default)]
    pub lines: Vec<QuoteLineInput>,
    /// Used when no lines are given.
    pub amount: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuoteInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub lines: Option<Vec<QuoteLineInput>>,
    pub amount: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeStageInput {
    pub stage: QuoteStage,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteFilter {
    pub stage: Option<QuoteStage>,
    pub customer_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

fn build_lines(lines: Vec<QuoteLineInput>) -> Result<QuoteLines, ServiceError> {
    let mut built = Vec::with_capacity(lines.len());
    for (idx, line) in lines.into_iter().enumerate() {
        line.validate()?;
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {} quantity must be greater than zero",
                idx + 1
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {} unit price cannot be negative",
                idx + 1
            )));
        }
        built.push(QuoteLine {
            description: line.description.trim().to_string(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        });
    }
    Ok(QuoteLines(built))
}

/// Total of a quote: the sum of its lines, or `amount` when there are none.
fn quote_amount(lines: &QuoteLines, amount: Option<Decimal>) -> Result<Decimal, ServiceError> {
    if !lines.is_empty() {
        return within_storage(lines.total()).ok_or_else(|| {
            ServiceError::ValidationError("Quote total is out of range".to_string())
        });
    }
    let amount = amount.unwrap_or(Decimal::ZERO);
    if amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Amount cannot be negative".to_string(),
        ));
    }
    within_storage(Some(amount))
        .ok_or_else(|| ServiceError::ValidationError("Amount is out of range".to_string()))
}

async fn record_stage_change<C>(
    conn: &C,
    quote_id: Uuid,
    from: Option<QuoteStage>,
    to: QuoteStage,
    changed_by: Option<Uuid>,
    note: Option<String>,
) -> Result<quote_stage_change::Model, ServiceError>
where
    C: ConnectionTrait,
{
    quote_stage_change::ActiveModel {
        id: Set(Uuid::new_v4()),
        quote_id: Set(quote_id),
        from_stage: Set(from),
        to_stage: Set(to),
        changed_by: Set(changed_by),
        note: Set(note),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}

async fn linked_project<C>(conn: &C, quote_id: Uuid) -> Result<Option<project::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    project::Entity::find()
        .filter(project::Column::QuoteId.eq(quote_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Sales quotes and their pipeline.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_currency: String,
}

impl QuoteService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency: default_currency.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_quotes(
        &self,
        filter: &QuoteFilter,
        page: PageRequest,
    ) -> Result<Page<quote::Model>, ServiceError> {
        let mut query = quote::Entity::find().order_by_desc(quote::Column::Number);
        if let Some(stage) = filter.stage {
            query = query.filter(quote::Column::Stage.eq(stage));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(quote::Column::CustomerId.eq(customer_id));
        }
        if let Some(assigned_to) = filter.assigned_to {
            query = query.filter(quote::Column::AssignedTo.eq(assigned_to));
        }
        if let Some(needle) = normalize_search(filter.search.as_deref()) {
            query = query.filter(Condition::any().add(lower_contains(quote::Column::Title, &needle)));
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
    pub async fn get_quote(&self, id: Uuid) -> Result<quote::Model, ServiceError> {
        quote::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Quote", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_quote(
        &self,
        input: CreateQuoteInput,
        created_by: Option<Uuid>,
    ) -> Result<quote::Model, ServiceError> {
        input.validate()?;
        let lines = build_lines(input.lines)?;
        let amount = quote_amount(&lines, input.amount)?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        customer::Entity::find_by_id(input.customer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Customer", input.customer_id))?;

        let number = next_value(&txn, QUOTE_NUMBER).await?;
        let now = Utc::now();
        let created = quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            number: Set(number),
            customer_id: Set(input.customer_id),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            lines: Set(lines),
            amount: Set(amount),
            currency: Set(input
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| self.default_currency.clone())),
            valid_until: Set(input.valid_until),
            stage: Set(QuoteStage::Draft),
            assigned_to: Set(input.assigned_to.or(created_by)),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        record_stage_change(&txn, created.id, None, QuoteStage::Draft, created_by, None).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(quote_id = %created.id, number, amount = %created.amount, "Quote created");
        self.event_sender
            .send_or_log(Event::QuoteCreated {
                quote_id: created.id,
                number,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_quote(
        &self,
        id: Uuid,
        input: UpdateQuoteInput,
    ) -> Result<quote::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_quote(id).await?;
        let had_lines = !existing.lines.is_empty();
        let mut lines = existing.lines.clone();
        let lines_changed = input.lines.is_some();
        let mut model: quote::ActiveModel = existing.into();

        if let Some(new_lines) = input.lines {
            lines = build_lines(new_lines)?;
            model.lines = Set(lines.clone());
        }
        if !lines.is_empty() {
            model.amount = Set(quote_amount(&lines, None)?);
        } else if let Some(amount) = input.amount {
            model.amount = Set(quote_amount(&lines, Some(amount))?);
        } else if lines_changed && had_lines {
            // The old amount was the total of the lines just removed.
            return Err(ServiceError::ValidationError(
                "An amount is required when removing every line".to_string(),
            ));
        }
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if input.description.is_some() {
            model.description = Set(input.description);
        }
        if let Some(currency) = input.currency {
            model.currency = Set(currency.to_uppercase());
        }
        if input.valid_until.is_some() {
            model.valid_until = Set(input.valid_until);
        }
        if input.assigned_to.is_some() {
            model.assigned_to = Set(input.assigned_to);
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(quote_id = %id, "Quote updated");
        Ok(updated)
    }

    /// Deletes a quote and its history. Quotes that started a project are kept.
    #[instrument(skip(self))]
    pub async fn delete_quote(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get_quote(id).await?;
        if let Some(project) = linked_project(&*self.db, id).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote {} is linked to project {}",
                existing.number, project.order_number
            )));
        }
        existing
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(quote_id = %id, "Quote deleted");
        Ok(())
    }

    /// Moves a quote to another pipeline stage and records the change.
    #[instrument(skip(self, input))]
    pub async fn change_stage(
        &self,
        id: Uuid,
        input: ChangeStageInput,
        changed_by: Option<Uuid>,
    ) -> Result<quote::Model, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = quote::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Quote", id))?;

        let from = existing.stage;
        let to = input.stage;
        if from == to {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote is already {}",
                to
            )));
        }
        if from == QuoteStage::Won && linked_project(&txn, id).await?.is_some() {
            return Err(ServiceError::InvalidOperation(
                "Quote already started a project and must stay won".to_string(),
            ));
        }

        let mut model: quote::ActiveModel = existing.into();
        model.stage = Set(to);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&txn).await.map_err(ServiceError::db_error)?;
        record_stage_change(&txn, id, Some(from), to, changed_by, input.note).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(quote_id = %id, %from, %to, "Quote stage changed");
        self.event_sender
            .send_or_log(Event::QuoteStageChanged {
                quote_id: id,
                from: from.to_string(),
                to: to.to_string(),
            })
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn stage_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<quote_stage_change::Model>, ServiceError> {
        self.get_quote(id)
            .await?
            .find_related(quote_stage_change::Entity)
            .order_by_asc(quote_stage_change::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Starts the fulfillment project of a won quote.
    #[instrument(skip(self))]
    pub async fn create_project(
        &self,
        id: Uuid,
        created_by: Option<Uuid>,
    ) -> Result<project::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let existing = quote::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Quote", id))?;
        if existing.stage != QuoteStage::Won {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote {} is {}, only won quotes start projects",
                existing.number, existing.stage
            )));
        }
        if let Some(project) = linked_project(&txn, id).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "Quote {} already has project {}",
                existing.number, project.order_number
            )));
        }

        let created = insert_project(
            &txn,
            NewProject {
                customer_id: existing.customer_id,
                quote_id: Some(existing.id),
                title: existing.title.clone(),
                address: None,
                notes: existing.description.clone(),
                created_by,
            },
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            quote_id = %id,
            project_id = %created.id,
            order_number = created.order_number,
            "Project created from quote"
        );
        self.event_sender
            .send_or_log(Event::ProjectCreated {
                project_id: created.id,
                order_number: created.order_number,
            })
            .await;
        Ok(created)
    }
}

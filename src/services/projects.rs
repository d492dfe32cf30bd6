use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    lower_contains, map_unique_violation, normalize_search,
    sequences::{next_value, PROJECT_ORDER_NUMBER},
    Page, PageRequest,
};
use crate::{
    entities::{
        customer, project,
        quote::{self, QuoteStage},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::project_workflow::{empty_detail, ProjectStage, StageDetail},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProjectInput {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProjectInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub stage: Option<ProjectStage>,
    pub customer_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Fields of a project about to be inserted.
pub(crate) struct NewProject {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub title: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Inserts a project at the first stage with empty details, numbering it
/// from the order-number sequence. Run inside the caller's transaction.
pub(crate) async fn insert_project<C>(conn: &C, new: NewProject) -> Result<project::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if let Some(quote_id) = new.quote_id {
        let linked = project::Entity::find()
            .filter(project::Column::QuoteId.eq(quote_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if linked.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Quote {} already has a project",
                quote_id
            )));
        }
    }

    let order_number = next_value(conn, PROJECT_ORDER_NUMBER).await?;
    let now = Utc::now();
    project::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number),
        customer_id: Set(new.customer_id),
        quote_id: Set(new.quote_id),
        title: Set(new.title),
        address: Set(new.address),
        notes: Set(new.notes),
        current_stage: Set(ProjectStage::TechnicalVisit.to_string()),
        technical_visit: Set(empty_detail()),
        measurement: Set(empty_detail()),
        verification: Set(empty_detail()),
        workshop: Set(empty_detail()),
        warehouse: Set(empty_detail()),
        logistics: Set(empty_detail()),
        created_by: Set(new.created_by),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        map_unique_violation(
            e,
            format!(
                "Project order number {} or its quote link was taken concurrently, retry",
                order_number
            ),
        )
    })
}

/// Fulfillment projects and their stage workflow.
#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProjectService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn current_stage(model: &project::Model) -> Result<ProjectStage, ServiceError> {
        model.stage().ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Project {} has unknown stage {}",
                model.id, model.current_stage
            ))
        })
    }

    #[instrument(skip(self))]
    pub async fn list_projects(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<project::Model>, ServiceError> {
        let mut query = project::Entity::find().order_by_desc(project::Column::OrderNumber);
        if let Some(stage) = filter.stage {
            query = query.filter(project::Column::CurrentStage.eq(stage.as_ref()));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(project::Column::CustomerId.eq(customer_id));
        }
        if let Some(needle) = normalize_search(filter.search.as_deref()) {
            query = query.filter(
                Condition::any()
                    .add(lower_contains(project::Column::Title, &needle))
                    .add(lower_contains(project::Column::Address, &needle)),
            );
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
    pub async fn get_project(&self, id: Uuid) -> Result<project::Model, ServiceError> {
        project::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Project", id))
    }

    /// Creates a project. A linked quote must belong to the same customer,
    /// be won and not have a project yet.
    #[instrument(skip(self, input))]
    pub async fn create_project(
        &self,
        input: CreateProjectInput,
        created_by: Option<Uuid>,
    ) -> Result<project::Model, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        customer::Entity::find_by_id(input.customer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Customer", input.customer_id))?;

        if let Some(quote_id) = input.quote_id {
            let linked = quote::Entity::find_by_id(quote_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::not_found("Quote", quote_id))?;
            if linked.customer_id != input.customer_id {
                return Err(ServiceError::InvalidInput(
                    "Quote belongs to another customer".to_string(),
                ));
            }
            if linked.stage != QuoteStage::Won {
                return Err(ServiceError::InvalidOperation(format!(
                    "Quote {} is {} and cannot start a project",
                    linked.number, linked.stage
                )));
            }
        }

        let created = insert_project(
            &txn,
            NewProject {
                customer_id: input.customer_id,
                quote_id: input.quote_id,
                title: input.title.trim().to_string(),
                address: input.address,
                notes: input.notes,
                created_by,
            },
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(project_id = %created.id, order_number = created.order_number, "Project created");
        self.event_sender
            .send_or_log(Event::ProjectCreated {
                project_id: created.id,
                order_number: created.order_number,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_project(
        &self,
        id: Uuid,
        input: UpdateProjectInput,
    ) -> Result<project::Model, ServiceError> {
        input.validate()?;
        let mut model: project::ActiveModel = self.get_project(id).await?.into();
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if input.address.is_some() {
            model.address = Set(input.address);
        }
        if input.notes.is_some() {
            model.notes = Set(input.notes);
        }
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete_project(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_project(id)
            .await?
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }

    /// Moves the project to `target` if the workflow allows it.
    #[instrument(skip(self))]
    pub async fn set_stage(
        &self,
        id: Uuid,
        target: ProjectStage,
    ) -> Result<project::Model, ServiceError> {
        let existing = self.get_project(id).await?;
        let from = Self::current_stage(&existing)?;
        let to = from.transition_to(target).map_err(|e| {
            warn!(project_id = %id, %from, %target, "Rejected stage change");
            e
        })?;

        // Only move if nobody changed the stage since we read it.
        let result = project::Entity::update_many()
            .col_expr(
                project::Column::CurrentStage,
                sea_orm::sea_query::Expr::value(to.to_string()),
            )
            .col_expr(
                project::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(project::Column::Id.eq(id))
            .filter(project::Column::CurrentStage.eq(from.as_ref()))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected != 1 {
            return Err(ServiceError::Conflict(
                "Project stage changed concurrently, reload and retry".to_string(),
            ));
        }

        info!(project_id = %id, %from, %to, "Project stage changed");
        self.event_sender
            .send_or_log(Event::ProjectStageChanged {
                project_id: id,
                from: from.to_string(),
                to: to.to_string(),
            })
            .await;
        self.get_project(id).await
    }

    /// Moves the project one step forward.
    #[instrument(skip(self))]
    pub async fn advance(&self, id: Uuid) -> Result<project::Model, ServiceError> {
        let existing = self.get_project(id).await?;
        let from = Self::current_stage(&existing)?;
        let next = from.next().ok_or_else(|| {
            ServiceError::InvalidOperation(format!("Project is {} and cannot advance", from))
        })?;
        self.set_stage(id, next).await
    }

    /// Replaces the detail document of an operational stage after validating
    /// it against that stage's schema.
    #[instrument(skip(self, document))]
    pub async fn put_stage_detail(
        &self,
        id: Uuid,
        stage: ProjectStage,
        document: Value,
    ) -> Result<project::Model, ServiceError> {
        let detail = StageDetail::parse(stage, document)?;
        let existing = self.get_project(id).await?;
        self.store_detail(existing, detail.stage(), detail.to_document()?)
            .await
    }

    /// Resets the detail document of a stage to `{}`.
    #[instrument(skip(self))]
    pub async fn clear_stage_detail(
        &self,
        id: Uuid,
        stage: ProjectStage,
    ) -> Result<project::Model, ServiceError> {
        let existing = self.get_project(id).await?;
        self.store_detail(existing, stage, empty_detail()).await
    }

    async fn store_detail(
        &self,
        existing: project::Model,
        stage: ProjectStage,
        document: Value,
    ) -> Result<project::Model, ServiceError> {
        let id = existing.id;
        let mut model: project::ActiveModel = existing.into();
        if !model.set_detail(stage, document) {
            return Err(ServiceError::InvalidInput(format!(
                "Stage {} has no detail document",
                stage
            )));
        }
        model.updated_at = Set(Utc::now());
        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(project_id = %id, %stage, "Stage detail stored");
        Ok(updated)
    }
}

use chrono::{DateTime, Utc};
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
use crate::{
    entities::task::{self, TaskPriority, TaskStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTaskInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    /// Only open tasks past their due date.
    #[serde(default)]
    pub overdue: bool,
    pub search: Option<String>,
}

fn open_statuses() -> [TaskStatus; 2] {
    [TaskStatus::Pending, TaskStatus::InProgress]
}

/// Condition matching open tasks due before `now`.
pub(crate) fn overdue_condition(now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(task::Column::Status.is_in(open_statuses()))
        .add(task::Column::DueDate.is_not_null())
        .add(task::Column::DueDate.lt(now))
}

pub(crate) fn open_condition() -> Condition {
    Condition::all().add(task::Column::Status.is_in(open_statuses()))
}

#[derive(Clone)]
pub struct TaskService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl TaskService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<task::Model>, ServiceError> {
        let mut query = task::Entity::find()
            .order_by_asc(task::Column::DueDate)
            .order_by_desc(task::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(task::Column::Status.eq(status));
        }
        if let Some(assignee_id) = filter.assignee_id {
            query = query.filter(task::Column::AssigneeId.eq(assignee_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(task::Column::CustomerId.eq(customer_id));
        }
        if let Some(project_id) = filter.project_id {
            query = query.filter(task::Column::ProjectId.eq(project_id));
        }
        if filter.overdue {
            query = query.filter(overdue_condition(Utc::now()));
        }
        if let Some(needle) = normalize_search(filter.search.as_deref()) {
            query = query.filter(lower_contains(task::Column::Title, &needle));
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
    pub async fn get_task(&self, id: Uuid) -> Result<task::Model, ServiceError> {
        task::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Task", id))
    }

    #[instrument(skip(self, input))]
    pub async fn create_task(
        &self,
        input: CreateTaskInput,
        created_by: Option<Uuid>,
    ) -> Result<task::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let created = task::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            status: Set(TaskStatus::Pending),
            priority: Set(input.priority.unwrap_or(TaskPriority::Medium)),
            due_date: Set(input.due_date),
            assignee_id: Set(input.assignee_id.or(created_by)),
            customer_id: Set(input.customer_id),
            quote_id: Set(input.quote_id),
            project_id: Set(input.project_id),
            created_by: Set(created_by),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(task_id = %created.id, "Task created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_task(
        &self,
        id: Uuid,
        input: UpdateTaskInput,
    ) -> Result<task::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_task(id).await?;
        let was_done = existing.status == TaskStatus::Done;
        let mut model: task::ActiveModel = existing.into();

        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if input.description.is_some() {
            model.description = Set(input.description);
        }
        if let Some(status) = input.status {
            model.status = Set(status);
            match (was_done, status == TaskStatus::Done) {
                (false, true) => model.completed_at = Set(Some(Utc::now())),
                (true, false) => model.completed_at = Set(None),
                _ => {}
            }
        }
        if let Some(priority) = input.priority {
            model.priority = Set(priority);
        }
        if input.due_date.is_some() {
            model.due_date = Set(input.due_date);
        }
        if input.assignee_id.is_some() {
            model.assignee_id = Set(input.assignee_id);
        }
        if input.customer_id.is_some() {
            model.customer_id = Set(input.customer_id);
        }
        if input.quote_id.is_some() {
            model.quote_id = Set(input.quote_id);
        }
        if input.project_id.is_some() {
            model.project_id = Set(input.project_id);
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(task_id = %id, status = ?updated.status, "Task updated");
        Ok(updated)
    }

    /// Marks a task done. Completing a done task is a no-op.
    #[instrument(skip(self))]
    pub async fn complete_task(&self, id: Uuid) -> Result<task::Model, ServiceError> {
        let existing = self.get_task(id).await?;
        match existing.status {
            TaskStatus::Done => return Ok(existing),
            TaskStatus::Cancelled => {
                return Err(ServiceError::InvalidOperation(
                    "Cancelled tasks cannot be completed".to_string(),
                ))
            }
            TaskStatus::Pending | TaskStatus::InProgress => {}
        }

        let now = Utc::now();
        let mut model: task::ActiveModel = existing.into();
        model.status = Set(TaskStatus::Done);
        model.completed_at = Set(Some(now));
        model.updated_at = Set(now);
        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(task_id = %id, "Task completed");
        self.event_sender.send_or_log(Event::TaskCompleted(id)).await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_task(id)
            .await?
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(task_id = %id, "Task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use tokio::sync::mpsc;

    async fn service() -> TaskService {
        let (tx, _rx) = mpsc::channel(16);
        TaskService::new(Arc::new(migrated_memory_pool().await), EventSender::new(tx))
    }

    fn input(title: &str, due_in_days: Option<i64>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            description: None,
            priority: None,
            due_date: due_in_days.map(|d| Utc::now() + Duration::days(d)),
            assignee_id: None,
            customer_id: None,
            quote_id: None,
            project_id: None,
        }
    }

    #[tokio::test]
    async fn overdue_filter_only_returns_open_late_tasks() {
        let tasks = service().await;
        let late = tasks
            .create_task(input("Llamar por seña", Some(-1)), None)
            .await
            .unwrap();
        let late_done = tasks
            .create_task(input("Enviar planos", Some(-3)), None)
            .await
            .unwrap();
        tasks
            .create_task(input("Medir obra", Some(5)), None)
            .await
            .unwrap();
        tasks.create_task(input("Sin fecha", None), None).await.unwrap();
        tasks.complete_task(late_done.id).await.unwrap();

        let overdue = tasks
            .list_tasks(
                &TaskFilter {
                    overdue: true,
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(overdue.total, 1);
        assert_eq!(overdue.items[0].id, late.id);
    }

    #[tokio::test]
    async fn completing_sets_timestamp_and_reopening_clears_it() {
        let tasks = service().await;
        let created = tasks.create_task(input("Presupuesto", None), None).await.unwrap();
        assert_eq!(created.priority, TaskPriority::Medium);

        let done = tasks.complete_task(created.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert!(done.completed_at.is_some());

        let reopened = tasks
            .update_task(
                created.id,
                UpdateTaskInput {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn cancelled_tasks_cannot_be_completed() {
        let tasks = service().await;
        let created = tasks.create_task(input("Visita", None), None).await.unwrap();
        tasks
            .update_task(
                created.id,
                UpdateTaskInput {
                    status: Some(TaskStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_matches!(
            tasks.complete_task(created.id).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }
}

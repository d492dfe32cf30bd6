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

use super::{lower_contains, map_unique_violation, normalize_search, Page, PageRequest};
use crate::{
    auth::{
        user::{self, UserProfile, UserRole},
        AuthService,
    },
    entities::branch,
    errors::ServiceError,
    events::{Event, EventSender},
    media::validate_image_ref,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    pub role: UserRole,
    pub branch_id: Option<Uuid>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

/// Administrative update of any account.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 256))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub branch_id: Option<Uuid>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub active: Option<bool>,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 256))]
    pub new_password: String,
}

/// Service for user accounts and profiles
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    async fn find(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    async fn ensure_branch(&self, branch_id: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(id) = branch_id {
            branch::Entity::find_by_id(id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::not_found("Branch", id))?;
        }
        Ok(())
    }

    async fn ensure_email_free(&self, email: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        let taken = query
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Email {} is already registered",
                email
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, ServiceError> {
        let mut query = user::Entity::find().order_by_asc(user::Column::Name);
        if let Some(needle) = normalize_search(search) {
            query = query.filter(
                Condition::any()
                    .add(lower_contains(user::Column::Name, &needle))
                    .add(lower_contains(user::Column::Email, &needle)),
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

        Ok(Page::new(items, total, page).map(UserProfile::from))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserProfile, ServiceError> {
        self.find(id).await.map(UserProfile::from)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<UserProfile, ServiceError> {
        input.validate()?;
        if let Some(avatar) = &input.avatar {
            validate_image_ref(avatar)?;
        }
        let email = input.email.trim().to_lowercase();
        self.ensure_email_free(&email, None).await?;
        self.ensure_branch(input.branch_id).await?;

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email.clone()),
            password_hash: Set(AuthService::hash_password(&input.password)?),
            role: Set(input.role),
            branch_id: Set(input.branch_id),
            phone: Set(input.phone),
            avatar: Set(input.avatar),
            active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| map_unique_violation(e, format!("Email {} is already registered", email)))?;

        info!(user_id = %model.id, role = %model.role, "User created");
        self.event_sender
            .send_or_log(Event::UserCreated(model.id))
            .await;
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        id: Uuid,
        input: UpdateUserInput,
    ) -> Result<UserProfile, ServiceError> {
        input.validate()?;
        let existing = self.find(id).await?;
        let mut model: user::ActiveModel = existing.into();

        if let Some(name) = input.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_free(&email, Some(id)).await?;
            model.email = Set(email);
        }
        if let Some(password) = input.password {
            model.password_hash = Set(AuthService::hash_password(&password)?);
        }
        if let Some(role) = input.role {
            model.role = Set(role);
        }
        if input.branch_id.is_some() {
            self.ensure_branch(input.branch_id).await?;
            model.branch_id = Set(input.branch_id);
        }
        if let Some(phone) = input.phone {
            model.phone = Set(Some(phone));
        }
        if let Some(avatar) = input.avatar {
            validate_image_ref(&avatar)?;
            model.avatar = Set(Some(avatar));
        }
        if let Some(active) = input.active {
            model.active = Set(active);
        }
        model.updated_at = Set(Utc::now());

        let updated = model
            .update(&*self.db)
            .await
            .map_err(|e| map_unique_violation(e, "Email is already registered"))?;
        info!(user_id = %id, "User updated");
        Ok(updated.into())
    }

    /// Deletes an account. Administrators cannot delete themselves.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid, acting_user: Uuid) -> Result<(), ServiceError> {
        if id == acting_user {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }
        let existing = self.find(id).await?;
        existing
            .delete(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<UserProfile, ServiceError> {
        self.update_user(
            id,
            UpdateUserInput {
                name: input.name,
                phone: input.phone,
                avatar: input.avatar,
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        input.validate()?;
        let existing = self.find(id).await?;
        if !AuthService::verify_password(&existing.password_hash, &input.current_password) {
            return Err(ServiceError::InvalidInput(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut model: user::ActiveModel = existing.into();
        model.password_hash = Set(AuthService::hash_password(&input.new_password)?);
        model.updated_at = Set(Utc::now());
        model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid) -> Result<UserProfile, ServiceError> {
        let existing = self.find(id).await?;
        let mut model: user::ActiveModel = existing.into();
        model.last_login_at = Set(Some(Utc::now()));
        let updated = model
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    async fn service() -> UserService {
        let (tx, _rx) = mpsc::channel(16);
        UserService::new(Arc::new(migrated_memory_pool().await), EventSender::new(tx))
    }

    fn input(email: &str) -> CreateUserInput {
        CreateUserInput {
            name: "Marta".to_string(),
            email: email.to_string(),
            password: "secret-password".to_string(),
            role: UserRole::Sales,
            branch_id: None,
            phone: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn emails_are_unique_case_insensitively() {
        let users = service().await;
        let created = users.create_user(input("Marta@Example.com")).await.unwrap();
        assert_eq!(created.email, "marta@example.com");

        assert_matches!(
            users.create_user(input("marta@example.com")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let users = service().await;
        let created = users.create_user(input("a@example.com")).await.unwrap();

        let wrong = users
            .change_password(
                created.id,
                ChangePasswordInput {
                    current_password: "nope".to_string(),
                    new_password: "another-password".to_string(),
                },
            )
            .await;
        assert_matches!(wrong, Err(ServiceError::InvalidInput(_)));

        users
            .change_password(
                created.id,
                ChangePasswordInput {
                    current_password: "secret-password".to_string(),
                    new_password: "another-password".to_string(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_avatar_is_rejected() {
        let users = service().await;
        let created = users.create_user(input("b@example.com")).await.unwrap();
        let result = users
            .update_profile(
                created.id,
                UpdateProfileInput {
                    avatar: Some("data:image/png;base64,???".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn admins_cannot_delete_themselves() {
        let users = service().await;
        let created = users.create_user(input("c@example.com")).await.unwrap();
        assert_matches!(
            users.delete_user(created.id, created.id).await,
            Err(ServiceError::InvalidOperation(_))
        );
        users.delete_user(created.id, Uuid::new_v4()).await.unwrap();
        assert_matches!(users.get_user(created.id).await, Err(ServiceError::NotFound(_)));
    }
}

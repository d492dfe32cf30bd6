use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Database entity for user accounts
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    #[sea_orm(nullable)]
    pub branch_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    /// Data URI or external URL.
    #[sea_orm(column_type = "Text", nullable)]
    pub avatar: Option<String>,
    pub active: bool,
    #[sea_orm(nullable)]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::branch::Entity",
        from = "Column::BranchId",
        to = "crate::entities::branch::Column::Id"
    )]
    Branch,
}

impl Related<crate::entities::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "production")]
    Production,
    #[sea_orm(string_value = "logistics")]
    Logistics,
    #[sea_orm(string_value = "viewer")]
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Sales => "sales",
            UserRole::Production => "production",
            UserRole::Logistics => "logistics",
            UserRole::Viewer => "viewer",
        }
    }

    /// Viewers can read everything but never write.
    pub fn can_write(&self) -> bool {
        !matches!(self, UserRole::Viewer)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "sales" => Ok(UserRole::Sales),
            "production" => Ok(UserRole::Production),
            "logistics" => Ok(UserRole::Logistics),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Public view of a user account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub branch_id: Option<Uuid>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Model> for UserProfile {
    fn from(user: Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            branch_id: user.branch_id,
            phone: user.phone,
            avatar: user.avatar,
            active: user.active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

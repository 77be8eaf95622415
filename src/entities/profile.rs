//! Profile entity - A named budgeting persona under one user.
//!
//! Profiles are soft-deactivated, never removed. Exactly one profile per user is primary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Short name, unique per user; the flat store keys period data by it
    pub profile_name: String,
    /// Name shown in the interface
    pub display_name: Option<String>,
    /// Whether this is the user's primary profile
    pub is_primary: bool,
    /// Soft deactivation flag
    pub is_active: bool,
    /// When the profile was created
    pub created_at: DateTimeUtc,
    /// Last modification time
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Profile and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each profile belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One profile has many budget periods
    #[sea_orm(has_many = "super::budget_period::Entity")]
    BudgetPeriods,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::budget_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

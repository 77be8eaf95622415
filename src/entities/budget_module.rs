//! Budget module entity - Account-wide catalog of budget categories (Need, Want, Savings, ...).
//!
//! Modules are shared across periods; allocations reference them, they never own them.
//! System modules are seeded at sign-up and cannot be deactivated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget module database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_modules")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Machine name (e.g. `"need"`)
    pub module_name: String,
    /// Name shown in the interface
    pub display_name: String,
    /// Whether the module counts toward the budget total
    pub include_in_budget: bool,
    /// Seeded default, non-deletable
    pub is_system_module: bool,
    /// Soft deactivation flag
    pub is_active: bool,
    /// Display ordering, ascending
    pub sort_order: i32,
    /// When the module was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between BudgetModule and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One module is referenced by many allocations
    #[sea_orm(has_many = "super::budget_allocation::Entity")]
    Allocations,
}

impl Related<super::budget_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

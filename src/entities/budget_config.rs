//! Budget config entity - Salary and budget share of one period.
//!
//! At most one config exists per period (`budget_period_id` is unique).
//! `total_budget_amount` is derived: `monthly_salary * budget_percentage / 100`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget config database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_configs")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Owning profile
    pub profile_id: String,
    /// Period this config belongs to
    #[sea_orm(unique)]
    pub budget_period_id: String,
    /// Monthly salary
    pub monthly_salary: f64,
    /// Share of the salary that is budgeted, 0-100
    pub budget_percentage: f64,
    /// Derived budget total
    pub total_budget_amount: f64,
    /// When the config was first saved
    pub created_at: DateTimeUtc,
    /// Last save time
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between BudgetConfig and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One config has many allocations
    #[sea_orm(has_many = "super::budget_allocation::Entity")]
    Allocations,
}

impl Related<super::budget_allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Computes the budget total from the salary and the budgeted share.
#[must_use]
pub fn total_budget_amount(monthly_salary: f64, budget_percentage: f64) -> f64 {
    monthly_salary * budget_percentage / 100.0
}

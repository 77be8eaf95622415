//! Budget allocation entity - The share of a config's total given to one module.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget allocation database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_allocations")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Config this allocation splits
    pub budget_config_id: String,
    /// Module receiving the share
    pub budget_module_id: String,
    /// Share of the config total, 0-100
    pub allocation_percentage: f64,
    /// `total_budget_amount * allocation_percentage / 100` at save time
    pub allocated_amount: f64,
    /// When the allocation was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between BudgetAllocation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each allocation belongs to one config
    #[sea_orm(
        belongs_to = "super::budget_config::Entity",
        from = "Column::BudgetConfigId",
        to = "super::budget_config::Column::Id"
    )]
    BudgetConfig,
    /// Each allocation references one module
    #[sea_orm(
        belongs_to = "super::budget_module::Entity",
        from = "Column::BudgetModuleId",
        to = "super::budget_module::Column::Id"
    )]
    BudgetModule,
}

impl Related<super::budget_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetConfig.def()
    }
}

impl Related<super::budget_module::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetModule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

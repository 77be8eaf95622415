//! Investment portfolio entity - Root of the portfolio -> category -> fund allocation tree.
//!
//! Portfolios belong to one budget period. `invested_amount` accumulates what has actually
//! been invested; it is reset to zero when a plan is inherited into a new period.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an allocation value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum AllocationType {
    /// `allocation_value` is a percentage of the parent amount
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// `allocation_value` is a fixed amount
    #[sea_orm(string_value = "amount")]
    Amount,
}

/// Investment portfolio database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investment_portfolios")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Owning profile
    pub profile_id: String,
    /// Period the portfolio is planned for
    pub budget_period_id: String,
    /// Portfolio name
    pub name: String,
    /// Interpretation of `allocation_value`
    pub allocation_type: AllocationType,
    /// Percentage or fixed amount, per `allocation_type`
    pub allocation_value: f64,
    /// Amount planned for this portfolio
    pub allocated_amount: f64,
    /// Amount invested so far in this period
    pub invested_amount: f64,
    /// Whether money may be invested without picking a category
    pub allow_direct_investment: bool,
    /// Soft deactivation flag
    pub is_active: bool,
    /// When the portfolio was created
    pub created_at: DateTimeUtc,
    /// Last modification time
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between InvestmentPortfolio and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each portfolio belongs to one period
    #[sea_orm(
        belongs_to = "super::budget_period::Entity",
        from = "Column::BudgetPeriodId",
        to = "super::budget_period::Column::Id"
    )]
    BudgetPeriod,
    /// One portfolio owns many categories
    #[sea_orm(has_many = "super::investment_category::Entity")]
    Categories,
}

impl Related<super::budget_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetPeriod.def()
    }
}

impl Related<super::investment_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

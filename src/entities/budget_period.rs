//! Budget period entity - The (user, profile, month, year) container scoping all period data.
//!
//! The relational schema carries a unique index over the key columns, see
//! [`crate::config::database::create_tables`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget period database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_periods")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Owning profile
    pub profile_id: String,
    /// Month, 1-12
    pub budget_month: i32,
    /// Four digit year
    pub budget_year: i32,
    /// Whether the period is in use
    pub is_active: bool,
    /// When the period was first resolved
    pub created_at: DateTimeUtc,
}

/// Defines relationships between BudgetPeriod and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each period belongs to one profile
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::ProfileId",
        to = "super::profile::Column::Id"
    )]
    Profile,
    /// One period has many portfolios
    #[sea_orm(has_many = "super::investment_portfolio::Entity")]
    InvestmentPortfolios,
    /// One period has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::investment_portfolio::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvestmentPortfolios.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

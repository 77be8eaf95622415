//! Investment category entity - Middle level of the allocation tree, owned by one portfolio.
use super::investment_portfolio::AllocationType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment category database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investment_categories")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Parent portfolio
    pub portfolio_id: String,
    /// Category name
    pub name: String,
    /// Interpretation of `allocation_value`
    pub allocation_type: AllocationType,
    /// Percentage or fixed amount, per `allocation_type`
    pub allocation_value: f64,
    /// Amount planned for this category
    pub allocated_amount: f64,
    /// Amount invested so far in this period
    pub invested_amount: f64,
    /// Soft deactivation flag
    pub is_active: bool,
    /// When the category was created
    pub created_at: DateTimeUtc,
    /// Last modification time
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between InvestmentCategory and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each category belongs to one portfolio
    #[sea_orm(
        belongs_to = "super::investment_portfolio::Entity",
        from = "Column::PortfolioId",
        to = "super::investment_portfolio::Column::Id"
    )]
    Portfolio,
    /// One category owns many funds
    #[sea_orm(has_many = "super::investment_fund::Entity")]
    Funds,
}

impl Related<super::investment_portfolio::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Portfolio.def()
    }
}

impl Related<super::investment_fund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

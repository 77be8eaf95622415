//! Investment fund entity - Leaf of the allocation tree, owned by one category.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Investment fund database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "investment_funds")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Parent category
    pub category_id: String,
    /// Fund name
    pub name: String,
    /// Amount planned for this fund
    pub allocated_amount: f64,
    /// Amount invested so far in this period
    pub invested_amount: f64,
    /// Soft deactivation flag
    pub is_active: bool,
    /// When the fund was created
    pub created_at: DateTimeUtc,
    /// Last modification time
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between InvestmentFund and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each fund belongs to one category
    #[sea_orm(
        belongs_to = "super::investment_category::Entity",
        from = "Column::CategoryId",
        to = "super::investment_category::Column::Id"
    )]
    Category,
}

impl Related<super::investment_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

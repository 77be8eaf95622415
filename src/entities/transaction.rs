//! Transaction entity - Money movements recorded within one budget period.
//!
//! Transactions are soft deleted (`is_deleted` + `deleted_at`). The `status` field only
//! moves away from `active`; the refunded states are reachable through the refund
//! workflow alone, see [`crate::core::transaction::refund_transaction`].
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What kind of money movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money spent
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Money received
    #[sea_orm(string_value = "income")]
    Income,
    /// Reversal of an earlier transaction
    #[sea_orm(string_value = "refund")]
    Refund,
    /// Money put into a portfolio
    #[sea_orm(string_value = "investment")]
    Investment,
    /// Money set aside
    #[sea_orm(string_value = "savings")]
    Savings,
    /// Money moved between accounts
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Counts toward the period
    #[sea_orm(string_value = "active")]
    Active,
    /// Voided by the user
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Fully refunded
    #[sea_orm(string_value = "refunded")]
    Refunded,
    /// Partially refunded
    #[sea_orm(string_value = "partial_refund")]
    PartialRefund,
}

impl TransactionStatus {
    /// Whether this state is owned by the refund workflow.
    #[must_use]
    pub const fn is_refund_state(self) -> bool {
        matches!(self, Self::Refunded | Self::PartialRefund)
    }
}

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Debit or credit card
    #[sea_orm(string_value = "card")]
    Card,
    /// Unified payments interface
    #[sea_orm(string_value = "upi")]
    Upi,
    /// Net banking
    #[sea_orm(string_value = "netbanking")]
    Netbanking,
    /// Cheque
    #[sea_orm(string_value = "cheque")]
    Cheque,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Owning profile
    pub profile_id: String,
    /// Period the transaction is booked in
    pub budget_period_id: String,
    /// Month of the period, 1-12
    pub budget_month: i32,
    /// Year of the period
    pub budget_year: i32,
    /// Kind of money movement
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Category tag (`need`, `want`, `savings`, `investments`, `unplanned`, ...)
    pub category: String,
    /// Positive amount
    pub amount: f64,
    /// Free text description
    pub description: Option<String>,
    /// Free text notes
    pub notes: Option<String>,
    /// Calendar date of the transaction
    pub transaction_date: Date,
    /// How it was paid
    pub payment_method: Option<PaymentMethod>,
    /// Who or what the money was spent for
    pub spent_for: Option<String>,
    /// User tag
    pub tag: Option<String>,
    /// Linked portfolio, for investment transactions
    pub portfolio_id: Option<String>,
    /// Linked investment category
    pub investment_category_id: Option<String>,
    /// Linked investment fund
    pub fund_id: Option<String>,
    /// Transaction this one refunds
    pub refund_for: Option<String>,
    /// Transaction this one was derived from
    pub original_transaction_id: Option<String>,
    /// Lifecycle state
    pub status: TransactionStatus,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// Last modification time
    pub updated_at: DateTimeUtc,
    /// When the record was soft deleted
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one period
    #[sea_orm(
        belongs_to = "super::budget_period::Entity",
        from = "Column::BudgetPeriodId",
        to = "super::budget_period::Column::Id"
    )]
    BudgetPeriod,
}

impl Related<super::budget_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetPeriod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

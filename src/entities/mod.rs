//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! The flat store persists the same Model structs as JSON, so both backends
//! hand back identical records.

pub mod budget_allocation;
pub mod budget_config;
pub mod budget_module;
pub mod budget_period;
pub mod configuration_inheritance;
pub mod credential;
pub mod investment_category;
pub mod investment_fund;
pub mod investment_portfolio;
pub mod profile;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use budget_allocation::{Entity as BudgetAllocation, Model as BudgetAllocationModel};
pub use budget_config::{Entity as BudgetConfig, Model as BudgetConfigModel};
pub use budget_module::{Entity as BudgetModule, Model as BudgetModuleModel};
pub use budget_period::{Entity as BudgetPeriod, Model as BudgetPeriodModel};
pub use configuration_inheritance::{
    Entity as ConfigurationInheritance, InheritedComponent, Model as ConfigurationInheritanceModel,
};
pub use credential::Entity as Credential;
pub use investment_category::{Entity as InvestmentCategory, Model as InvestmentCategoryModel};
pub use investment_fund::{Entity as InvestmentFund, Model as InvestmentFundModel};
pub use investment_portfolio::{
    AllocationType, Entity as InvestmentPortfolio, Model as InvestmentPortfolioModel,
};
pub use profile::{Entity as Profile, Model as ProfileModel};
pub use transaction::{
    Entity as Transaction, Model as TransactionModel, PaymentMethod, TransactionStatus,
    TransactionType,
};
pub use user::{Entity as User, Model as UserModel};

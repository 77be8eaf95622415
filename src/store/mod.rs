//! Entity store adapters.
//!
//! [`BudgetStore`] is the single capability set the business logic talks to. Two
//! implementations exist and are picked once, at composition time, by [`open_store`]:
//!
//! * [`RelationalStore`] - normalized tables with foreign keys, filtered and joined in SQL.
//! * [`FlatStore`] - one serialized record list per (namespace, user, category, profile,
//!   month, year) key on top of a [`KeyValueEngine`]; filtering and joining happen in memory.
//!
//! Both return the same entity `Model` records and the same nested portfolio shape.

pub mod engine;
pub mod flat;
pub mod relational;

pub use engine::{FileEngine, KeyValueEngine, MemoryEngine};
pub use flat::FlatStore;
pub use relational::RelationalStore;

use crate::{
    config::{StorageBackend, StorageConfig, database},
    entities::{
        budget_allocation, budget_config, budget_module, budget_period,
        configuration_inheritance, investment_category, investment_fund, investment_portfolio,
        profile, transaction, user,
    },
    errors::Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// Fully resolved coordinates of one budget period.
///
/// The relational store only needs `period_id`; the flat store builds its storage keys
/// from the user, profile name, month and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodScope {
    /// Owning user
    pub user_id: String,
    /// Owning profile
    pub profile_id: String,
    /// Profile name, part of the flat store's keys
    pub profile_name: String,
    /// Period identifier
    pub period_id: String,
    /// Month of the period, 1-12
    pub month: i32,
    /// Year of the period
    pub year: i32,
}

impl PeriodScope {
    /// Builds the scope of `period`, which must belong to `profile`.
    #[must_use]
    pub fn new(profile: &profile::Model, period: &budget_period::Model) -> Self {
        Self {
            user_id: period.user_id.clone(),
            profile_id: profile.id.clone(),
            profile_name: profile.profile_name.clone(),
            period_id: period.id.clone(),
            month: period.budget_month,
            year: period.budget_year,
        }
    }
}

/// A category together with its active funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    /// The category row
    #[serde(flatten)]
    pub category: investment_category::Model,
    /// Active funds of the category, oldest first
    pub funds: Vec<investment_fund::Model>,
}

/// A portfolio together with its active categories and their funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioNode {
    /// The portfolio row
    #[serde(flatten)]
    pub portfolio: investment_portfolio::Model,
    /// Active categories of the portfolio, oldest first
    pub categories: Vec<CategoryNode>,
}

/// Joins flat portfolio, category and fund lists into the nested tree.
///
/// Inactive rows are dropped at every level and children whose parent is missing are
/// ignored. Each level is ordered by creation time.
#[must_use]
pub fn assemble_portfolio_tree(
    mut portfolios: Vec<investment_portfolio::Model>,
    mut categories: Vec<investment_category::Model>,
    mut funds: Vec<investment_fund::Model>,
) -> Vec<PortfolioNode> {
    portfolios.sort_by_key(|p| p.created_at);
    categories.sort_by_key(|c| c.created_at);
    funds.sort_by_key(|f| f.created_at);

    let mut funds_by_category: HashMap<String, Vec<investment_fund::Model>> = HashMap::new();
    for fund in funds.into_iter().filter(|f| f.is_active) {
        funds_by_category
            .entry(fund.category_id.clone())
            .or_default()
            .push(fund);
    }

    let mut categories_by_portfolio: HashMap<String, Vec<CategoryNode>> = HashMap::new();
    for category in categories.into_iter().filter(|c| c.is_active) {
        let funds = funds_by_category.remove(&category.id).unwrap_or_default();
        categories_by_portfolio
            .entry(category.portfolio_id.clone())
            .or_default()
            .push(CategoryNode { category, funds });
    }

    portfolios
        .into_iter()
        .filter(|p| p.is_active)
        .map(|portfolio| {
            let categories = categories_by_portfolio
                .remove(&portfolio.id)
                .unwrap_or_default();
            PortfolioNode {
                portfolio,
                categories,
            }
        })
        .collect()
}

/// Backend-neutral access to every persisted collection.
///
/// Period-scoped methods take a [`PeriodScope`]; account-wide collections (users,
/// profiles, modules, inheritance records) are keyed by user id. Methods return raw
/// rows: filtering of inactive or deleted rows is left to the caller, except in
/// [`BudgetStore::load_portfolio_tree`].
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Looks up a user by id.
    async fn find_user(&self, user_id: &str) -> Result<Option<user::Model>>;
    /// Looks up a user by sign-in email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>>;
    /// Stores a new user together with its password hash.
    async fn insert_user(&self, user: user::Model, password_hash: String)
    -> Result<user::Model>;
    /// Returns the stored password hash of a user.
    async fn find_password_hash(&self, user_id: &str) -> Result<Option<String>>;

    /// Lists every profile of a user, including inactive ones, oldest first.
    async fn list_profiles(&self, user_id: &str) -> Result<Vec<profile::Model>>;
    /// Looks up one profile of a user.
    async fn find_profile(&self, user_id: &str, profile_id: &str)
    -> Result<Option<profile::Model>> {
        Ok(self
            .list_profiles(user_id)
            .await?
            .into_iter()
            .find(|p| p.id == profile_id))
    }
    /// Stores a new profile.
    async fn insert_profile(&self, profile: profile::Model) -> Result<profile::Model>;
    /// Replaces a stored profile.
    async fn update_profile(&self, profile: profile::Model) -> Result<profile::Model>;

    /// Looks up the period of a profile by its (month, year) key.
    async fn find_period(
        &self,
        profile: &profile::Model,
        month: i32,
        year: i32,
    ) -> Result<Option<budget_period::Model>>;
    /// Looks up any period of a user by id.
    async fn find_period_by_id(
        &self,
        user_id: &str,
        period_id: &str,
    ) -> Result<Option<budget_period::Model>>;
    /// Lists every period of a profile.
    async fn list_periods(&self, profile: &profile::Model) -> Result<Vec<budget_period::Model>>;
    /// Stores a new period. Fails if the (user, profile, month, year) slot is taken.
    async fn insert_period(
        &self,
        profile: &profile::Model,
        period: budget_period::Model,
    ) -> Result<budget_period::Model>;

    /// Lists every budget module of a user, including inactive ones.
    async fn list_modules(&self, user_id: &str) -> Result<Vec<budget_module::Model>>;
    /// Stores a new module.
    async fn insert_module(&self, module: budget_module::Model) -> Result<budget_module::Model>;
    /// Replaces a stored module.
    async fn update_module(&self, module: budget_module::Model) -> Result<budget_module::Model>;

    /// Returns the config of the period, if one was saved.
    async fn find_config(&self, scope: &PeriodScope) -> Result<Option<budget_config::Model>>;
    /// Inserts or replaces the config of the period.
    async fn save_config(
        &self,
        scope: &PeriodScope,
        config: budget_config::Model,
    ) -> Result<budget_config::Model>;
    /// Removes the period's config and its allocations.
    async fn delete_config(&self, scope: &PeriodScope) -> Result<()>;
    /// Lists the allocations of a config.
    async fn list_allocations(
        &self,
        scope: &PeriodScope,
        config_id: &str,
    ) -> Result<Vec<budget_allocation::Model>>;
    /// Removes every allocation of a config.
    async fn delete_allocations(&self, scope: &PeriodScope, config_id: &str) -> Result<()>;
    /// Stores new allocations.
    async fn insert_allocations(
        &self,
        scope: &PeriodScope,
        allocations: Vec<budget_allocation::Model>,
    ) -> Result<Vec<budget_allocation::Model>>;

    /// Lists the period's portfolios.
    async fn list_portfolios(&self, scope: &PeriodScope)
    -> Result<Vec<investment_portfolio::Model>>;
    /// Stores a new portfolio.
    async fn insert_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model>;
    /// Replaces a portfolio of the period; `NotFound` if it is not part of it.
    async fn update_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model>;
    /// Removes a portfolio with its categories and funds; `NotFound` if absent.
    async fn delete_portfolio(&self, scope: &PeriodScope, portfolio_id: &str) -> Result<()>;
    /// Lists the categories of every portfolio of the period.
    async fn list_categories(&self, scope: &PeriodScope)
    -> Result<Vec<investment_category::Model>>;
    /// Stores a new category.
    async fn insert_category(
        &self,
        scope: &PeriodScope,
        category: investment_category::Model,
    ) -> Result<investment_category::Model>;
    /// Lists the funds of every category of the period.
    async fn list_funds(&self, scope: &PeriodScope) -> Result<Vec<investment_fund::Model>>;
    /// Stores a new fund.
    async fn insert_fund(
        &self,
        scope: &PeriodScope,
        fund: investment_fund::Model,
    ) -> Result<investment_fund::Model>;
    /// Removes every portfolio, category and fund of the period.
    async fn delete_all_portfolios(&self, scope: &PeriodScope) -> Result<()>;
    /// Loads the active portfolio tree of the period.
    ///
    /// The default joins the three flat lists in memory; stores able to join on their
    /// side override it.
    async fn load_portfolio_tree(&self, scope: &PeriodScope) -> Result<Vec<PortfolioNode>> {
        let portfolios = self.list_portfolios(scope).await?;
        let categories = self.list_categories(scope).await?;
        let funds = self.list_funds(scope).await?;
        Ok(assemble_portfolio_tree(portfolios, categories, funds))
    }

    /// Lists every transaction of the period, soft-deleted ones included, newest first.
    async fn list_transactions(&self, scope: &PeriodScope) -> Result<Vec<transaction::Model>>;
    /// Stores a new transaction.
    async fn insert_transaction(
        &self,
        scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model>;
    /// Replaces a transaction of the period; `NotFound` if it is not part of it.
    async fn update_transaction(
        &self,
        scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model>;
    /// Hard-removes every transaction of the period.
    async fn delete_all_transactions(&self, scope: &PeriodScope) -> Result<()>;

    /// Appends an inheritance audit record.
    async fn insert_inheritance(
        &self,
        record: configuration_inheritance::Model,
    ) -> Result<configuration_inheritance::Model>;
    /// Lists the inheritance records of a profile, oldest first.
    async fn list_inheritances(
        &self,
        user_id: &str,
        profile_id: &str,
    ) -> Result<Vec<configuration_inheritance::Model>>;
}

/// Opens the store selected by `config`.
///
/// The relational store gets its schema created; the flat store runs on files when a
/// data directory is configured and in memory otherwise.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn BudgetStore>> {
    match config.backend {
        StorageBackend::Relational => {
            let db = database::create_connection(&config.database_url).await?;
            database::create_tables(&db).await?;
            info!("Opened relational store");
            Ok(Arc::new(RelationalStore::new(db)))
        }
        StorageBackend::Flat => match &config.data_dir {
            Some(dir) => {
                let engine = FileEngine::open(dir).await?;
                info!("Opened flat store on {}", dir.display());
                Ok(Arc::new(FlatStore::new(engine, &config.namespace)))
            }
            None => {
                info!("Opened in-memory flat store");
                Ok(Arc::new(FlatStore::new(
                    MemoryEngine::default(),
                    &config.namespace,
                )))
            }
        },
    }
}

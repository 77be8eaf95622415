//! Relational store on SeaORM.
//!
//! Every collection is its own table; scoping is done with SQL filters and joins
//! through the foreign keys. Multi-row writes run inside a database transaction.

use super::{BudgetStore, PeriodScope, PortfolioNode, assemble_portfolio_tree};
use crate::{
    entities::{
        BudgetAllocation, BudgetConfig, BudgetModule, BudgetPeriod, ConfigurationInheritance,
        Credential, InvestmentCategory, InvestmentFund, InvestmentPortfolio, Profile, Transaction,
        User, budget_allocation, budget_config, budget_module, budget_period,
        configuration_inheritance, credential, investment_category, investment_fund,
        investment_portfolio, profile, transaction, user,
    },
    errors::{Error, Result, StoreResultExt},
};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};

/// [`BudgetStore`] backed by a SQL database.
#[derive(Debug)]
pub struct RelationalStore {
    db: DatabaseConnection,
}

impl RelationalStore {
    /// Wraps an open connection whose schema already exists.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn scoped_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio_id: &str,
    ) -> Result<investment_portfolio::Model> {
        InvestmentPortfolio::find_by_id(portfolio_id.to_string())
            .filter(investment_portfolio::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .one(&self.db)
            .await
            .store_op("find_portfolio")?
            .ok_or_else(|| Error::not_found("investment_portfolio", portfolio_id))
    }
}

/// Deletes the categories of `portfolio_ids` and their funds.
async fn delete_portfolio_children<C: ConnectionTrait>(
    conn: &C,
    portfolio_ids: Vec<String>,
) -> Result<()> {
    let category_ids: Vec<String> = InvestmentCategory::find()
        .filter(investment_category::Column::PortfolioId.is_in(portfolio_ids))
        .all(conn)
        .await
        .store_op("delete_portfolio")?
        .into_iter()
        .map(|c| c.id)
        .collect();

    InvestmentFund::delete_many()
        .filter(investment_fund::Column::CategoryId.is_in(category_ids.clone()))
        .exec(conn)
        .await
        .store_op("delete_portfolio")?;
    InvestmentCategory::delete_many()
        .filter(investment_category::Column::Id.is_in(category_ids))
        .exec(conn)
        .await
        .store_op("delete_portfolio")?;
    Ok(())
}

#[async_trait]
impl BudgetStore for RelationalStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<user::Model>> {
        User::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .store_op("find_user")
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .store_op("find_user")
    }

    async fn insert_user(
        &self,
        user: user::Model,
        password_hash: String,
    ) -> Result<user::Model> {
        let txn = self.db.begin().await.store_op("insert_user")?;
        let user = user::ActiveModel::from(user)
            .reset_all()
            .insert(&txn)
            .await
            .store_op("insert_user")?;
        credential::ActiveModel::from(credential::Model {
            user_id: user.id.clone(),
            password_hash,
        })
        .reset_all()
        .insert(&txn)
        .await
        .store_op("insert_user")?;
        txn.commit().await.store_op("insert_user")?;
        Ok(user)
    }

    async fn find_password_hash(&self, user_id: &str) -> Result<Option<String>> {
        Ok(Credential::find_by_id(user_id.to_string())
            .one(&self.db)
            .await
            .store_op("find_credentials")?
            .map(|c| c.password_hash))
    }

    async fn list_profiles(&self, user_id: &str) -> Result<Vec<profile::Model>> {
        Profile::find()
            .filter(profile::Column::UserId.eq(user_id))
            .order_by_asc(profile::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_profiles")
    }

    async fn find_profile(
        &self,
        user_id: &str,
        profile_id: &str,
    ) -> Result<Option<profile::Model>> {
        Profile::find_by_id(profile_id.to_string())
            .filter(profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .store_op("find_profile")
    }

    async fn insert_profile(&self, profile: profile::Model) -> Result<profile::Model> {
        profile::ActiveModel::from(profile)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_profile")
    }

    async fn update_profile(&self, profile: profile::Model) -> Result<profile::Model> {
        profile::ActiveModel::from(profile)
            .reset_all()
            .update(&self.db)
            .await
            .store_op("update_profile")
    }

    async fn find_period(
        &self,
        profile: &profile::Model,
        month: i32,
        year: i32,
    ) -> Result<Option<budget_period::Model>> {
        BudgetPeriod::find()
            .filter(budget_period::Column::UserId.eq(profile.user_id.as_str()))
            .filter(budget_period::Column::ProfileId.eq(profile.id.as_str()))
            .filter(budget_period::Column::BudgetMonth.eq(month))
            .filter(budget_period::Column::BudgetYear.eq(year))
            .one(&self.db)
            .await
            .store_op("find_period")
    }

    async fn find_period_by_id(
        &self,
        user_id: &str,
        period_id: &str,
    ) -> Result<Option<budget_period::Model>> {
        BudgetPeriod::find_by_id(period_id.to_string())
            .filter(budget_period::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .store_op("find_period")
    }

    async fn list_periods(&self, profile: &profile::Model) -> Result<Vec<budget_period::Model>> {
        BudgetPeriod::find()
            .filter(budget_period::Column::ProfileId.eq(profile.id.as_str()))
            .order_by_desc(budget_period::Column::BudgetYear)
            .order_by_desc(budget_period::Column::BudgetMonth)
            .all(&self.db)
            .await
            .store_op("list_periods")
    }

    async fn insert_period(
        &self,
        _profile: &profile::Model,
        period: budget_period::Model,
    ) -> Result<budget_period::Model> {
        budget_period::ActiveModel::from(period)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_period")
    }

    async fn list_modules(&self, user_id: &str) -> Result<Vec<budget_module::Model>> {
        BudgetModule::find()
            .filter(budget_module::Column::UserId.eq(user_id))
            .order_by_asc(budget_module::Column::SortOrder)
            .all(&self.db)
            .await
            .store_op("list_modules")
    }

    async fn insert_module(&self, module: budget_module::Model) -> Result<budget_module::Model> {
        budget_module::ActiveModel::from(module)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_module")
    }

    async fn update_module(&self, module: budget_module::Model) -> Result<budget_module::Model> {
        budget_module::ActiveModel::from(module)
            .reset_all()
            .update(&self.db)
            .await
            .store_op("update_module")
    }

    async fn find_config(&self, scope: &PeriodScope) -> Result<Option<budget_config::Model>> {
        BudgetConfig::find()
            .filter(budget_config::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .one(&self.db)
            .await
            .store_op("find_config")
    }

    async fn save_config(
        &self,
        _scope: &PeriodScope,
        config: budget_config::Model,
    ) -> Result<budget_config::Model> {
        let exists = BudgetConfig::find_by_id(config.id.clone())
            .one(&self.db)
            .await
            .store_op("save_config")?
            .is_some();
        let active = budget_config::ActiveModel::from(config).reset_all();
        if exists {
            active.update(&self.db).await.store_op("save_config")
        } else {
            active.insert(&self.db).await.store_op("save_config")
        }
    }

    async fn delete_config(&self, scope: &PeriodScope) -> Result<()> {
        let Some(config) = self.find_config(scope).await? else {
            return Ok(());
        };
        let txn = self.db.begin().await.store_op("delete_config")?;
        BudgetAllocation::delete_many()
            .filter(budget_allocation::Column::BudgetConfigId.eq(config.id.as_str()))
            .exec(&txn)
            .await
            .store_op("delete_config")?;
        BudgetConfig::delete_by_id(config.id)
            .exec(&txn)
            .await
            .store_op("delete_config")?;
        txn.commit().await.store_op("delete_config")
    }

    async fn list_allocations(
        &self,
        _scope: &PeriodScope,
        config_id: &str,
    ) -> Result<Vec<budget_allocation::Model>> {
        BudgetAllocation::find()
            .filter(budget_allocation::Column::BudgetConfigId.eq(config_id))
            .order_by_asc(budget_allocation::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_allocations")
    }

    async fn delete_allocations(&self, _scope: &PeriodScope, config_id: &str) -> Result<()> {
        BudgetAllocation::delete_many()
            .filter(budget_allocation::Column::BudgetConfigId.eq(config_id))
            .exec(&self.db)
            .await
            .store_op("delete_allocations")?;
        Ok(())
    }

    async fn insert_allocations(
        &self,
        _scope: &PeriodScope,
        allocations: Vec<budget_allocation::Model>,
    ) -> Result<Vec<budget_allocation::Model>> {
        if allocations.is_empty() {
            return Ok(allocations);
        }
        let rows = allocations
            .iter()
            .cloned()
            .map(|a| budget_allocation::ActiveModel::from(a).reset_all());
        BudgetAllocation::insert_many(rows)
            .exec_without_returning(&self.db)
            .await
            .store_op("insert_allocations")?;
        Ok(allocations)
    }

    async fn list_portfolios(
        &self,
        scope: &PeriodScope,
    ) -> Result<Vec<investment_portfolio::Model>> {
        InvestmentPortfolio::find()
            .filter(investment_portfolio::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .order_by_asc(investment_portfolio::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_portfolios")
    }

    async fn insert_portfolio(
        &self,
        _scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model> {
        investment_portfolio::ActiveModel::from(portfolio)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_portfolio")
    }

    async fn update_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model> {
        self.scoped_portfolio(scope, &portfolio.id).await?;
        investment_portfolio::ActiveModel::from(portfolio)
            .reset_all()
            .update(&self.db)
            .await
            .store_op("update_portfolio")
    }

    async fn delete_portfolio(&self, scope: &PeriodScope, portfolio_id: &str) -> Result<()> {
        let portfolio = self.scoped_portfolio(scope, portfolio_id).await?;
        let txn = self.db.begin().await.store_op("delete_portfolio")?;
        delete_portfolio_children(&txn, vec![portfolio.id.clone()]).await?;
        InvestmentPortfolio::delete_by_id(portfolio.id)
            .exec(&txn)
            .await
            .store_op("delete_portfolio")?;
        txn.commit().await.store_op("delete_portfolio")
    }

    async fn list_categories(
        &self,
        scope: &PeriodScope,
    ) -> Result<Vec<investment_category::Model>> {
        InvestmentCategory::find()
            .inner_join(InvestmentPortfolio)
            .filter(investment_portfolio::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .order_by_asc(investment_category::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_categories")
    }

    async fn insert_category(
        &self,
        _scope: &PeriodScope,
        category: investment_category::Model,
    ) -> Result<investment_category::Model> {
        investment_category::ActiveModel::from(category)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_category")
    }

    async fn list_funds(&self, scope: &PeriodScope) -> Result<Vec<investment_fund::Model>> {
        InvestmentFund::find()
            .join(JoinType::InnerJoin, investment_fund::Relation::Category.def())
            .join(
                JoinType::InnerJoin,
                investment_category::Relation::Portfolio.def(),
            )
            .filter(investment_portfolio::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .order_by_asc(investment_fund::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_funds")
    }

    async fn insert_fund(
        &self,
        _scope: &PeriodScope,
        fund: investment_fund::Model,
    ) -> Result<investment_fund::Model> {
        investment_fund::ActiveModel::from(fund)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_fund")
    }

    async fn delete_all_portfolios(&self, scope: &PeriodScope) -> Result<()> {
        let portfolio_ids: Vec<String> = self
            .list_portfolios(scope)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if portfolio_ids.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin().await.store_op("delete_all_portfolios")?;
        delete_portfolio_children(&txn, portfolio_ids.clone()).await?;
        InvestmentPortfolio::delete_many()
            .filter(investment_portfolio::Column::Id.is_in(portfolio_ids))
            .exec(&txn)
            .await
            .store_op("delete_all_portfolios")?;
        txn.commit().await.store_op("delete_all_portfolios")
    }

    async fn load_portfolio_tree(&self, scope: &PeriodScope) -> Result<Vec<PortfolioNode>> {
        let rows = InvestmentPortfolio::find()
            .filter(investment_portfolio::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .filter(investment_portfolio::Column::IsActive.eq(true))
            .find_with_related(InvestmentCategory)
            .all(&self.db)
            .await
            .store_op("load_portfolio_tree")?;

        let mut portfolios = Vec::with_capacity(rows.len());
        let mut categories = Vec::new();
        for (portfolio, children) in rows {
            portfolios.push(portfolio);
            categories.extend(children);
        }

        let category_ids: Vec<String> = categories.iter().map(|c| c.id.clone()).collect();
        let funds = if category_ids.is_empty() {
            Vec::new()
        } else {
            InvestmentFund::find()
                .filter(investment_fund::Column::CategoryId.is_in(category_ids))
                .filter(investment_fund::Column::IsActive.eq(true))
                .all(&self.db)
                .await
                .store_op("load_portfolio_tree")?
        };

        Ok(assemble_portfolio_tree(portfolios, categories, funds))
    }

    async fn list_transactions(&self, scope: &PeriodScope) -> Result<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .order_by_desc(transaction::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_transactions")
    }

    async fn insert_transaction(
        &self,
        _scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model> {
        transaction::ActiveModel::from(transaction)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_transaction")
    }

    async fn update_transaction(
        &self,
        scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model> {
        Transaction::find_by_id(transaction.id.clone())
            .filter(transaction::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .one(&self.db)
            .await
            .store_op("update_transaction")?
            .ok_or_else(|| Error::not_found("transaction", &transaction.id))?;
        transaction::ActiveModel::from(transaction)
            .reset_all()
            .update(&self.db)
            .await
            .store_op("update_transaction")
    }

    async fn delete_all_transactions(&self, scope: &PeriodScope) -> Result<()> {
        Transaction::delete_many()
            .filter(transaction::Column::BudgetPeriodId.eq(scope.period_id.as_str()))
            .exec(&self.db)
            .await
            .store_op("delete_all_transactions")?;
        Ok(())
    }

    async fn insert_inheritance(
        &self,
        record: configuration_inheritance::Model,
    ) -> Result<configuration_inheritance::Model> {
        configuration_inheritance::ActiveModel::from(record)
            .reset_all()
            .insert(&self.db)
            .await
            .store_op("insert_inheritance")
    }

    async fn list_inheritances(
        &self,
        user_id: &str,
        profile_id: &str,
    ) -> Result<Vec<configuration_inheritance::Model>> {
        ConfigurationInheritance::find()
            .filter(configuration_inheritance::Column::UserId.eq(user_id))
            .filter(configuration_inheritance::Column::ProfileId.eq(profile_id))
            .order_by_asc(configuration_inheritance::Column::CreatedAt)
            .all(&self.db)
            .await
            .store_op("list_inheritances")
    }
}

//! Per-caller budget handle.
//!
//! [`BudgetData`] holds the (user, profile, month, year) selection of one caller together
//! with the last [`BudgetSnapshot`] it loaded. Every mutation resolves the period, writes
//! through the store and then reloads the whole snapshot; the cached snapshot is never
//! patched in place.
//!
//! Without a selected user or profile every mutation is a quiet no-op returning
//! `Ok(None)`.

use crate::{
    auth::{Identity, Session},
    core::{
        budget_config::{self, BudgetConfigInput},
        inheritance, module, period,
        portfolio::{self, CategoryInput, FundInput, PortfolioInput, PortfolioPatch},
        snapshot::{BudgetSnapshot, load_snapshot},
        transaction::{self, NewTransaction, TransactionPatch},
    },
    entities::{
        InheritedComponent, budget_config as budget_config_entity, budget_module, budget_period,
        configuration_inheritance, investment_category, investment_fund, investment_portfolio,
        transaction as transaction_entity,
    },
    errors::Result,
    store::{BudgetStore, PeriodScope},
};
use std::{future::Future, sync::Arc};
use tracing::{debug, info};

/// One caller's view of a budget period.
pub struct BudgetData {
    store: Arc<dyn BudgetStore>,
    user_id: Option<String>,
    profile_id: Option<String>,
    month: i32,
    year: i32,
    snapshot: Option<BudgetSnapshot>,
}

impl BudgetData {
    /// Creates a handle with no user or profile selected.
    #[must_use]
    pub fn new(store: Arc<dyn BudgetStore>, month: i32, year: i32) -> Self {
        Self {
            store,
            user_id: None,
            profile_id: None,
            month,
            year,
            snapshot: None,
        }
    }

    /// Creates a handle for the signed-in user's primary profile and loads its snapshot.
    ///
    /// Nothing is selected when nobody is signed in.
    pub async fn for_identity(identity: &Identity, month: i32, year: i32) -> Result<Self> {
        let mut data = Self::new(identity.store(), month, year);
        data.user_id = identity.current_user_id();
        data.profile_id = identity.primary_profile().await?.map(|p| p.id);
        data.refresh().await?;
        Ok(data)
    }

    /// Follows a session change.
    ///
    /// Switching to another user (or signing out) drops the profile selection and the
    /// cached snapshot.
    pub fn apply_session(&mut self, session: Option<&Session>) {
        let user_id = session.map(|s| s.user.id.clone());
        if user_id != self.user_id {
            debug!(user_id = ?user_id, "Session changed");
            self.user_id = user_id;
            self.profile_id = None;
            self.snapshot = None;
        }
    }

    /// Selects a profile of the current user. Clears the cached snapshot.
    pub fn select_profile(&mut self, profile_id: Option<String>) {
        self.profile_id = profile_id;
        self.snapshot = None;
    }

    /// Selects another period. Clears the cached snapshot.
    pub fn select_period(&mut self, month: i32, year: i32) {
        self.month = month;
        self.year = year;
        self.snapshot = None;
    }

    /// Selected user.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Selected profile.
    #[must_use]
    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.as_deref()
    }

    /// Selected (month, year).
    #[must_use]
    pub const fn period(&self) -> (i32, i32) {
        (self.month, self.year)
    }

    /// The last loaded snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&BudgetSnapshot> {
        self.snapshot.as_ref()
    }

    /// Reloads the snapshot of the current selection.
    ///
    /// Yields `None` (and drops the cache) when no user or profile is selected.
    pub async fn refresh(&mut self) -> Result<Option<&BudgetSnapshot>> {
        let (Some(user_id), Some(profile_id)) = (&self.user_id, &self.profile_id) else {
            self.snapshot = None;
            return Ok(None);
        };
        debug!(
            user_id = %user_id,
            profile_id = %profile_id,
            month = self.month,
            year = self.year,
            "Fetching budget snapshot"
        );
        let snapshot =
            load_snapshot(self.store.as_ref(), user_id, profile_id, self.month, self.year)
                .await?;
        Ok(Some(&*self.snapshot.insert(snapshot)))
    }

    /// Resolves (creating on first use) the period of the current selection.
    pub async fn scope(&self) -> Result<Option<PeriodScope>> {
        let (Some(user_id), Some(profile_id)) = (&self.user_id, &self.profile_id) else {
            return Ok(None);
        };
        period::resolve_scope(self.store.as_ref(), user_id, profile_id, self.month, self.year)
            .await
            .map(Some)
    }

    async fn mutate<T, F, Fut>(&mut self, operation: &'static str, op: F) -> Result<Option<T>>
    where
        F: FnOnce(Arc<dyn BudgetStore>, PeriodScope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(scope) = self.scope().await? else {
            debug!(operation, "No user or profile selected, skipping");
            return Ok(None);
        };
        let value = op(Arc::clone(&self.store), scope).await?;
        info!(operation, "Budget data changed, reloading snapshot");
        self.refresh().await?;
        Ok(Some(value))
    }

    /// Saves the period's budget config, replacing its allocations.
    pub async fn save_budget_config(
        &mut self,
        input: BudgetConfigInput,
    ) -> Result<Option<budget_config_entity::Model>> {
        self.mutate("save_budget_config", |store, scope| async move {
            budget_config::save_budget_config(store.as_ref(), &scope, input).await
        })
        .await
    }

    /// Removes the period's budget config.
    pub async fn delete_budget_config(&mut self) -> Result<Option<()>> {
        self.mutate("delete_budget_config", |store, scope| async move {
            budget_config::delete_budget_config(store.as_ref(), &scope).await
        })
        .await
    }

    /// Appends a portfolio to the period.
    pub async fn save_investment_portfolio(
        &mut self,
        input: PortfolioInput,
    ) -> Result<Option<investment_portfolio::Model>> {
        self.mutate("save_investment_portfolio", |store, scope| async move {
            portfolio::save_investment_portfolio(store.as_ref(), &scope, input).await
        })
        .await
    }

    /// Patches a portfolio of the period.
    pub async fn update_investment_portfolio(
        &mut self,
        portfolio_id: &str,
        patch: PortfolioPatch,
    ) -> Result<Option<investment_portfolio::Model>> {
        self.mutate("update_investment_portfolio", |store, scope| async move {
            portfolio::update_investment_portfolio(store.as_ref(), &scope, portfolio_id, patch)
                .await
        })
        .await
    }

    /// Removes a portfolio of the period with its categories and funds.
    pub async fn delete_investment_portfolio(&mut self, portfolio_id: &str) -> Result<Option<()>> {
        self.mutate("delete_investment_portfolio", |store, scope| async move {
            portfolio::delete_investment_portfolio(store.as_ref(), &scope, portfolio_id).await
        })
        .await
    }

    /// Removes every portfolio of the period.
    pub async fn delete_all_investment_portfolios(&mut self) -> Result<Option<()>> {
        self.mutate("delete_all_investment_portfolios", |store, scope| async move {
            portfolio::delete_all_investment_portfolios(store.as_ref(), &scope).await
        })
        .await
    }

    /// Adds a category under a portfolio of the period.
    pub async fn add_investment_category(
        &mut self,
        portfolio_id: &str,
        input: CategoryInput,
    ) -> Result<Option<investment_category::Model>> {
        self.mutate("add_investment_category", |store, scope| async move {
            portfolio::add_investment_category(store.as_ref(), &scope, portfolio_id, input).await
        })
        .await
    }

    /// Adds a fund under a category of the period.
    pub async fn add_investment_fund(
        &mut self,
        category_id: &str,
        input: FundInput,
    ) -> Result<Option<investment_fund::Model>> {
        self.mutate("add_investment_fund", |store, scope| async move {
            portfolio::add_investment_fund(store.as_ref(), &scope, category_id, input).await
        })
        .await
    }

    /// Replaces the period's whole investment plan.
    pub async fn replace_investment_plan(
        &mut self,
        plan: Vec<PortfolioInput>,
    ) -> Result<Option<Vec<investment_portfolio::Model>>> {
        self.mutate("replace_investment_plan", |store, scope| async move {
            portfolio::replace_investment_plan(store.as_ref(), &scope, plan).await
        })
        .await
    }

    /// Records a transaction in the period.
    pub async fn add_transaction(
        &mut self,
        input: NewTransaction,
    ) -> Result<Option<transaction_entity::Model>> {
        self.mutate("add_transaction", |store, scope| async move {
            transaction::add_transaction(store.as_ref(), &scope, input).await
        })
        .await
    }

    /// Patches a transaction of the period.
    pub async fn update_transaction(
        &mut self,
        transaction_id: &str,
        patch: TransactionPatch,
    ) -> Result<Option<transaction_entity::Model>> {
        self.mutate("update_transaction", |store, scope| async move {
            transaction::update_transaction(store.as_ref(), &scope, transaction_id, patch).await
        })
        .await
    }

    /// Soft-deletes a transaction of the period.
    pub async fn delete_transaction(
        &mut self,
        transaction_id: &str,
    ) -> Result<Option<transaction_entity::Model>> {
        self.mutate("delete_transaction", |store, scope| async move {
            transaction::delete_transaction(store.as_ref(), &scope, transaction_id).await
        })
        .await
    }

    /// Refunds (part of) a transaction of the period. Returns the refund row.
    pub async fn refund_transaction(
        &mut self,
        original_id: &str,
        amount: f64,
        reason: &str,
    ) -> Result<Option<transaction_entity::Model>> {
        self.mutate("refund_transaction", |store, scope| async move {
            transaction::refund_transaction(store.as_ref(), &scope, original_id, amount, reason)
                .await
        })
        .await
    }

    /// Hard-removes every transaction of the period.
    pub async fn delete_all_transactions(&mut self) -> Result<Option<()>> {
        self.mutate("delete_all_transactions", |store, scope| async move {
            transaction::delete_all_transactions(store.as_ref(), &scope).await
        })
        .await
    }

    /// Copies components of another period of the user into the selected period.
    pub async fn inherit_configuration(
        &mut self,
        source_period_id: &str,
        components: &[InheritedComponent],
    ) -> Result<Option<configuration_inheritance::Model>> {
        self.mutate("inherit_configuration", |store, scope| async move {
            inheritance::inherit_configuration(store.as_ref(), &scope, source_period_id, components)
                .await
        })
        .await
    }

    /// Adds a user-defined budget module.
    pub async fn create_budget_module(
        &mut self,
        module_name: &str,
        display_name: &str,
        include_in_budget: bool,
    ) -> Result<Option<budget_module::Model>> {
        let Some(user_id) = self.user_id.clone() else {
            return Ok(None);
        };
        let created = module::create_budget_module(
            self.store.as_ref(),
            &user_id,
            module_name,
            display_name,
            include_in_budget,
        )
        .await?;
        self.refresh().await?;
        Ok(Some(created))
    }

    /// Deactivates a user-defined budget module.
    pub async fn deactivate_budget_module(
        &mut self,
        module_id: &str,
    ) -> Result<Option<budget_module::Model>> {
        let Some(user_id) = self.user_id.clone() else {
            return Ok(None);
        };
        let module =
            module::deactivate_budget_module(self.store.as_ref(), &user_id, module_id).await?;
        self.refresh().await?;
        Ok(Some(module))
    }

    /// Inheritance records of the selected profile. Empty without a selection.
    pub async fn list_inheritances(&self) -> Result<Vec<configuration_inheritance::Model>> {
        let (Some(user_id), Some(profile_id)) = (&self.user_id, &self.profile_id) else {
            return Ok(Vec::new());
        };
        inheritance::list_inheritances(self.store.as_ref(), user_id, profile_id).await
    }

    /// Periods of the selected profile, newest first. Empty without a selection.
    pub async fn list_periods(&self) -> Result<Vec<budget_period::Model>> {
        let (Some(user_id), Some(profile_id)) = (&self.user_id, &self.profile_id) else {
            return Ok(Vec::new());
        };
        period::list_periods(self.store.as_ref(), user_id, profile_id).await
    }
}

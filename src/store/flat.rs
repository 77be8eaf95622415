//! Flat key-value store.
//!
//! Period-scoped data lives under
//! `{namespace}_budget_data_{user}_{category}_{profile}_{month}_{year}`, one JSON list per
//! category. Account-wide collections use `{namespace}_{collection}_{user}`.
//! All filtering and joining happens here, in memory.

use super::{BudgetStore, KeyValueEngine, PeriodScope};
use crate::{
    entities::{
        budget_allocation, budget_config, budget_module, budget_period,
        configuration_inheritance, credential, investment_category, investment_fund,
        investment_portfolio, profile, transaction, user,
    },
    errors::{Error, Result, StoreResultExt},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use tracing::debug;

const PERIOD: &str = "period";
const CONFIG: &str = "config";
const PORTFOLIOS: &str = "portfolios";
const CATEGORIES: &str = "categories";
const FUNDS: &str = "funds";
const TRANSACTIONS: &str = "transactions";

/// The config slot holds the config row with its allocations inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredConfig {
    #[serde(flatten)]
    config: budget_config::Model,
    #[serde(default)]
    allocations: Vec<budget_allocation::Model>,
}

/// Builds the storage key of one period-scoped category.
#[must_use]
pub fn budget_data_key(
    namespace: &str,
    user_id: &str,
    category: &str,
    profile_name: &str,
    month: i32,
    year: i32,
) -> String {
    format!("{namespace}_budget_data_{user_id}_{category}_{profile_name}_{month}_{year}")
}

/// [`BudgetStore`] over any [`KeyValueEngine`].
#[derive(Debug)]
pub struct FlatStore<E> {
    engine: E,
    namespace: String,
}

impl<E: KeyValueEngine> FlatStore<E> {
    /// Wraps `engine`, prefixing every key with `namespace`.
    pub fn new(engine: E, namespace: &str) -> Self {
        Self {
            engine,
            namespace: namespace.to_string(),
        }
    }

    /// The underlying engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Every period-scoped key belonging to a user.
    pub async fn user_keys(&self, user_id: &str) -> Result<Vec<String>> {
        self.engine
            .keys_with_prefix(&format!("{}_budget_data_{user_id}_", self.namespace))
            .await
    }

    /// Removes every period-scoped value of a user.
    pub async fn clear_user_data(&self, user_id: &str) -> Result<()> {
        let keys = self.user_keys(user_id).await?;
        debug!(user_id, count = keys.len(), "Clearing flat budget data");
        for key in keys {
            self.engine.remove(&key).await?;
        }
        Ok(())
    }

    fn global_key(&self, collection: &str) -> String {
        format!("{}_{collection}", self.namespace)
    }

    fn account_key(&self, collection: &str, user_id: &str) -> String {
        format!("{}_{collection}_{user_id}", self.namespace)
    }

    fn scope_key(&self, scope: &PeriodScope, category: &str) -> String {
        budget_data_key(
            &self.namespace,
            &scope.user_id,
            category,
            &scope.profile_name,
            scope.month,
            scope.year,
        )
    }

    fn period_slot(&self, profile: &profile::Model, month: i32, year: i32) -> String {
        budget_data_key(
            &self.namespace,
            &profile.user_id,
            PERIOD,
            &profile.profile_name,
            month,
            year,
        )
    }

    async fn read_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.engine.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).store_op("decode")?)),
            None => Ok(None),
        }
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        Ok(self.read_value(key).await?.unwrap_or_default())
    }

    async fn write_value<T: Serialize + Sync + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).store_op("encode")?;
        self.engine.set(key, raw).await
    }

    async fn all_periods(&self, user_id: &str) -> Result<Vec<budget_period::Model>> {
        let prefix = format!("{}_budget_data_{user_id}_{PERIOD}_", self.namespace);
        let mut periods = Vec::new();
        for key in self.engine.keys_with_prefix(&prefix).await? {
            if let Some(period) = self.read_value::<budget_period::Model>(&key).await? {
                periods.push(period);
            }
        }
        Ok(periods)
    }

    async fn read_config(&self, scope: &PeriodScope) -> Result<Option<StoredConfig>> {
        self.read_value(&self.scope_key(scope, CONFIG)).await
    }
}

/// Replaces the element with the same id, or fails with `NotFound`.
fn replace_by_id<T>(
    list: &mut [T],
    item: T,
    id_of: impl Fn(&T) -> &str,
    entity: &'static str,
) -> Result<()> {
    let id = id_of(&item).to_string();
    let slot = list
        .iter_mut()
        .find(|existing| id_of(existing) == id)
        .ok_or_else(|| Error::not_found(entity, id))?;
    *slot = item;
    Ok(())
}

#[async_trait]
impl<E: KeyValueEngine> BudgetStore for FlatStore<E> {
    async fn find_user(&self, user_id: &str) -> Result<Option<user::Model>> {
        let users: Vec<user::Model> = self.read_list(&self.global_key("users")).await?;
        Ok(users.into_iter().find(|u| u.id == user_id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>> {
        let users: Vec<user::Model> = self.read_list(&self.global_key("users")).await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    async fn insert_user(
        &self,
        user: user::Model,
        password_hash: String,
    ) -> Result<user::Model> {
        let users_key = self.global_key("users");
        let mut users: Vec<user::Model> = self.read_list(&users_key).await?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(Error::Store {
                operation: "insert_user",
                message: format!("email {} is already registered", user.email),
            });
        }
        users.push(user.clone());

        let credentials_key = self.global_key("credentials");
        let mut credentials: Vec<credential::Model> = self.read_list(&credentials_key).await?;
        credentials.push(credential::Model {
            user_id: user.id.clone(),
            password_hash,
        });

        self.write_value(&users_key, &users).await?;
        self.write_value(&credentials_key, &credentials).await?;
        Ok(user)
    }

    async fn find_password_hash(&self, user_id: &str) -> Result<Option<String>> {
        let credentials: Vec<credential::Model> =
            self.read_list(&self.global_key("credentials")).await?;
        Ok(credentials
            .into_iter()
            .find(|c| c.user_id == user_id)
            .map(|c| c.password_hash))
    }

    async fn list_profiles(&self, user_id: &str) -> Result<Vec<profile::Model>> {
        self.read_list(&self.account_key("profiles", user_id)).await
    }

    async fn insert_profile(&self, profile: profile::Model) -> Result<profile::Model> {
        let key = self.account_key("profiles", &profile.user_id);
        let mut profiles: Vec<profile::Model> = self.read_list(&key).await?;
        profiles.push(profile.clone());
        self.write_value(&key, &profiles).await?;
        Ok(profile)
    }

    async fn update_profile(&self, profile: profile::Model) -> Result<profile::Model> {
        let key = self.account_key("profiles", &profile.user_id);
        let mut profiles: Vec<profile::Model> = self.read_list(&key).await?;
        replace_by_id(&mut profiles, profile.clone(), |p| p.id.as_str(), "profile")?;
        self.write_value(&key, &profiles).await?;
        Ok(profile)
    }

    async fn find_period(
        &self,
        profile: &profile::Model,
        month: i32,
        year: i32,
    ) -> Result<Option<budget_period::Model>> {
        self.read_value(&self.period_slot(profile, month, year)).await
    }

    async fn find_period_by_id(
        &self,
        user_id: &str,
        period_id: &str,
    ) -> Result<Option<budget_period::Model>> {
        Ok(self
            .all_periods(user_id)
            .await?
            .into_iter()
            .find(|p| p.id == period_id))
    }

    async fn list_periods(&self, profile: &profile::Model) -> Result<Vec<budget_period::Model>> {
        Ok(self
            .all_periods(&profile.user_id)
            .await?
            .into_iter()
            .filter(|p| p.profile_id == profile.id)
            .collect())
    }

    async fn insert_period(
        &self,
        profile: &profile::Model,
        period: budget_period::Model,
    ) -> Result<budget_period::Model> {
        let key = self.period_slot(profile, period.budget_month, period.budget_year);
        let raw = serde_json::to_string(&period).store_op("encode")?;
        if !self.engine.set_if_absent(&key, raw).await? {
            return Err(Error::Store {
                operation: "insert_period",
                message: format!(
                    "period {}/{} already exists for profile {}",
                    period.budget_month, period.budget_year, profile.id
                ),
            });
        }
        Ok(period)
    }

    async fn list_modules(&self, user_id: &str) -> Result<Vec<budget_module::Model>> {
        self.read_list(&self.account_key("modules", user_id)).await
    }

    async fn insert_module(&self, module: budget_module::Model) -> Result<budget_module::Model> {
        let key = self.account_key("modules", &module.user_id);
        let mut modules: Vec<budget_module::Model> = self.read_list(&key).await?;
        modules.push(module.clone());
        self.write_value(&key, &modules).await?;
        Ok(module)
    }

    async fn update_module(&self, module: budget_module::Model) -> Result<budget_module::Model> {
        let key = self.account_key("modules", &module.user_id);
        let mut modules: Vec<budget_module::Model> = self.read_list(&key).await?;
        replace_by_id(&mut modules, module.clone(), |m| m.id.as_str(), "budget_module")?;
        self.write_value(&key, &modules).await?;
        Ok(module)
    }

    async fn find_config(&self, scope: &PeriodScope) -> Result<Option<budget_config::Model>> {
        Ok(self.read_config(scope).await?.map(|stored| stored.config))
    }

    async fn save_config(
        &self,
        scope: &PeriodScope,
        config: budget_config::Model,
    ) -> Result<budget_config::Model> {
        let allocations = match self.read_config(scope).await? {
            Some(existing) if existing.config.id == config.id => existing.allocations,
            _ => Vec::new(),
        };
        let stored = StoredConfig {
            config: config.clone(),
            allocations,
        };
        self.write_value(&self.scope_key(scope, CONFIG), &stored)
            .await?;
        Ok(config)
    }

    async fn delete_config(&self, scope: &PeriodScope) -> Result<()> {
        self.engine.remove(&self.scope_key(scope, CONFIG)).await
    }

    async fn list_allocations(
        &self,
        scope: &PeriodScope,
        config_id: &str,
    ) -> Result<Vec<budget_allocation::Model>> {
        Ok(match self.read_config(scope).await? {
            Some(stored) if stored.config.id == config_id => stored.allocations,
            _ => Vec::new(),
        })
    }

    async fn delete_allocations(&self, scope: &PeriodScope, config_id: &str) -> Result<()> {
        if let Some(mut stored) = self.read_config(scope).await? {
            if stored.config.id == config_id {
                stored.allocations.clear();
                self.write_value(&self.scope_key(scope, CONFIG), &stored)
                    .await?;
            }
        }
        Ok(())
    }

    async fn insert_allocations(
        &self,
        scope: &PeriodScope,
        allocations: Vec<budget_allocation::Model>,
    ) -> Result<Vec<budget_allocation::Model>> {
        if allocations.is_empty() {
            return Ok(allocations);
        }
        let mut stored = self
            .read_config(scope)
            .await?
            .ok_or_else(|| Error::not_found("budget_config", &scope.period_id))?;
        if let Some(stray) = allocations
            .iter()
            .find(|a| a.budget_config_id != stored.config.id)
        {
            return Err(Error::not_found("budget_config", &stray.budget_config_id));
        }
        stored.allocations.extend(allocations.iter().cloned());
        self.write_value(&self.scope_key(scope, CONFIG), &stored)
            .await?;
        Ok(allocations)
    }

    async fn list_portfolios(
        &self,
        scope: &PeriodScope,
    ) -> Result<Vec<investment_portfolio::Model>> {
        self.read_list(&self.scope_key(scope, PORTFOLIOS)).await
    }

    async fn insert_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model> {
        let key = self.scope_key(scope, PORTFOLIOS);
        let mut portfolios: Vec<investment_portfolio::Model> = self.read_list(&key).await?;
        portfolios.push(portfolio.clone());
        self.write_value(&key, &portfolios).await?;
        Ok(portfolio)
    }

    async fn update_portfolio(
        &self,
        scope: &PeriodScope,
        portfolio: investment_portfolio::Model,
    ) -> Result<investment_portfolio::Model> {
        let key = self.scope_key(scope, PORTFOLIOS);
        let mut portfolios: Vec<investment_portfolio::Model> = self.read_list(&key).await?;
        replace_by_id(
            &mut portfolios,
            portfolio.clone(),
            |p| p.id.as_str(),
            "investment_portfolio",
        )?;
        self.write_value(&key, &portfolios).await?;
        Ok(portfolio)
    }

    async fn delete_portfolio(&self, scope: &PeriodScope, portfolio_id: &str) -> Result<()> {
        let portfolios_key = self.scope_key(scope, PORTFOLIOS);
        let mut portfolios: Vec<investment_portfolio::Model> =
            self.read_list(&portfolios_key).await?;
        let before = portfolios.len();
        portfolios.retain(|p| p.id != portfolio_id);
        if portfolios.len() == before {
            return Err(Error::not_found("investment_portfolio", portfolio_id));
        }

        let categories_key = self.scope_key(scope, CATEGORIES);
        let categories: Vec<investment_category::Model> = self.read_list(&categories_key).await?;
        let (removed, kept): (Vec<_>, Vec<_>) = categories
            .into_iter()
            .partition(|c| c.portfolio_id == portfolio_id);
        let removed_ids: HashSet<String> = removed.into_iter().map(|c| c.id).collect();

        let funds_key = self.scope_key(scope, FUNDS);
        let mut funds: Vec<investment_fund::Model> = self.read_list(&funds_key).await?;
        funds.retain(|f| !removed_ids.contains(&f.category_id));

        self.write_value(&funds_key, &funds).await?;
        self.write_value(&categories_key, &kept).await?;
        self.write_value(&portfolios_key, &portfolios).await
    }

    async fn list_categories(
        &self,
        scope: &PeriodScope,
    ) -> Result<Vec<investment_category::Model>> {
        self.read_list(&self.scope_key(scope, CATEGORIES)).await
    }

    async fn insert_category(
        &self,
        scope: &PeriodScope,
        category: investment_category::Model,
    ) -> Result<investment_category::Model> {
        let key = self.scope_key(scope, CATEGORIES);
        let mut categories: Vec<investment_category::Model> = self.read_list(&key).await?;
        categories.push(category.clone());
        self.write_value(&key, &categories).await?;
        Ok(category)
    }

    async fn list_funds(&self, scope: &PeriodScope) -> Result<Vec<investment_fund::Model>> {
        self.read_list(&self.scope_key(scope, FUNDS)).await
    }

    async fn insert_fund(
        &self,
        scope: &PeriodScope,
        fund: investment_fund::Model,
    ) -> Result<investment_fund::Model> {
        let key = self.scope_key(scope, FUNDS);
        let mut funds: Vec<investment_fund::Model> = self.read_list(&key).await?;
        funds.push(fund.clone());
        self.write_value(&key, &funds).await?;
        Ok(fund)
    }

    async fn delete_all_portfolios(&self, scope: &PeriodScope) -> Result<()> {
        for category in [FUNDS, CATEGORIES, PORTFOLIOS] {
            self.engine.remove(&self.scope_key(scope, category)).await?;
        }
        Ok(())
    }

    async fn list_transactions(&self, scope: &PeriodScope) -> Result<Vec<transaction::Model>> {
        self.read_list(&self.scope_key(scope, TRANSACTIONS)).await
    }

    async fn insert_transaction(
        &self,
        scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model> {
        let key = self.scope_key(scope, TRANSACTIONS);
        let mut transactions: Vec<transaction::Model> = self.read_list(&key).await?;
        // Newest first
        transactions.insert(0, transaction.clone());
        self.write_value(&key, &transactions).await?;
        Ok(transaction)
    }

    async fn update_transaction(
        &self,
        scope: &PeriodScope,
        transaction: transaction::Model,
    ) -> Result<transaction::Model> {
        let key = self.scope_key(scope, TRANSACTIONS);
        let mut transactions: Vec<transaction::Model> = self.read_list(&key).await?;
        replace_by_id(&mut transactions, transaction.clone(), |t| t.id.as_str(), "transaction")?;
        self.write_value(&key, &transactions).await?;
        Ok(transaction)
    }

    async fn delete_all_transactions(&self, scope: &PeriodScope) -> Result<()> {
        self.engine
            .remove(&self.scope_key(scope, TRANSACTIONS))
            .await
    }

    async fn insert_inheritance(
        &self,
        record: configuration_inheritance::Model,
    ) -> Result<configuration_inheritance::Model> {
        let key = self.account_key("inheritances", &record.user_id);
        let mut records: Vec<configuration_inheritance::Model> = self.read_list(&key).await?;
        records.push(record.clone());
        self.write_value(&key, &records).await?;
        Ok(record)
    }

    async fn list_inheritances(
        &self,
        user_id: &str,
        profile_id: &str,
    ) -> Result<Vec<configuration_inheritance::Model>> {
        let records: Vec<configuration_inheritance::Model> =
            self.read_list(&self.account_key("inheritances", user_id)).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{store::MemoryEngine, test_utils::*};

    #[test]
    fn key_layout_matches_browser_storage() {
        assert_eq!(
            budget_data_key("lb", "u1", "transactions", "Primary", 3, 2025),
            "lb_budget_data_u1_transactions_Primary_3_2025"
        );
    }

    #[tokio::test]
    async fn period_data_is_stored_under_scoped_keys() {
        let store = FlatStore::new(MemoryEngine::default(), "lb");
        let scope = seed_scope(&store).await;

        store
            .insert_transaction(&scope, sample_transaction(&scope, 10.0))
            .await
            .unwrap();

        let raw = store
            .engine()
            .get(&format!(
                "lb_budget_data_{}_transactions_{}_{}_{}",
                scope.user_id, scope.profile_name, scope.month, scope.year
            ))
            .await
            .unwrap()
            .unwrap();
        let stored: Vec<transaction::Model> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn period_slot_keeps_the_first_insert() {
        let store = FlatStore::new(MemoryEngine::default(), "lb");
        let scope = seed_scope(&store).await;
        let profile = store
            .find_profile(&scope.user_id, &scope.profile_id)
            .await
            .unwrap()
            .unwrap();
        let stored = store
            .find_period(&profile, scope.month, scope.year)
            .await
            .unwrap()
            .unwrap();

        let rival = budget_period::Model {
            id: "rival".to_string(),
            ..stored.clone()
        };
        let err = store.insert_period(&profile, rival).await.unwrap_err();
        assert!(matches!(err, Error::Store { operation: "insert_period", .. }));

        let kept = store
            .find_period(&profile, scope.month, scope.year)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.id, stored.id);
    }

    #[tokio::test]
    async fn config_slot_inlines_allocations() {
        let store = FlatStore::new(MemoryEngine::default(), "lb");
        let scope = seed_scope(&store).await;
        let config = sample_config(&scope);
        store.save_config(&scope, config.clone()).await.unwrap();
        store
            .insert_allocations(&scope, vec![sample_allocation(&config.id, "module-1", 50.0)])
            .await
            .unwrap();

        let raw = store
            .engine()
            .get(&store.scope_key(&scope, CONFIG))
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["id"], config.id.as_str());
        assert_eq!(json["allocations"][0]["budget_module_id"], "module-1");
    }

    #[tokio::test]
    async fn clear_user_data_removes_only_that_user() {
        let store = FlatStore::new(MemoryEngine::default(), "lb");
        let scope = seed_scope(&store).await;
        store
            .insert_transaction(&scope, sample_transaction(&scope, 10.0))
            .await
            .unwrap();
        store.engine().set("lb_budget_data_someone-else_x", "[]".to_string()).await.unwrap();

        assert!(!store.user_keys(&scope.user_id).await.unwrap().is_empty());
        store.clear_user_data(&scope.user_id).await.unwrap();

        assert!(store.user_keys(&scope.user_id).await.unwrap().is_empty());
        assert!(store.list_transactions(&scope).await.unwrap().is_empty());
        assert!(
            store
                .engine()
                .get("lb_budget_data_someone-else_x")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn keys_carry_the_namespace() {
        let store = FlatStore::new(MemoryEngine::default(), "custom");
        let scope = seed_scope(&store).await;
        store
            .insert_transaction(&scope, sample_transaction(&scope, 10.0))
            .await
            .unwrap();

        assert!(!store.engine().keys_with_prefix("custom_budget_data_").await.unwrap().is_empty());
        assert!(store.engine().keys_with_prefix("lb_").await.unwrap().is_empty());
    }
}

//! Budget snapshot assembly.
//!
//! A snapshot is the read model of one period: profile, period, config with its
//! allocations, active modules, the active portfolio tree and the live transactions.
//! It is rebuilt from the store after every mutation instead of being patched in place.

use crate::{
    core::period::{find_profile, get_or_create_period},
    entities::{
        budget_allocation, budget_config, budget_module, budget_period, profile, transaction,
    },
    errors::Result,
    store::{BudgetStore, PeriodScope, PortfolioNode},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// An allocation joined to the module it funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationView {
    /// The allocation row
    #[serde(flatten)]
    pub allocation: budget_allocation::Model,
    /// The funded module, `None` if it no longer exists
    pub module: Option<budget_module::Model>,
}

/// The period's config together with its allocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfigView {
    /// The config row
    #[serde(flatten)]
    pub config: budget_config::Model,
    /// Allocations in creation order
    pub allocations: Vec<AllocationView>,
}

/// Fully assembled view of one budget period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Profile the period belongs to
    pub profile: profile::Model,
    /// The period itself
    pub period: budget_period::Model,
    /// Saved config, if any
    pub budget_config: Option<BudgetConfigView>,
    /// Active modules ordered by sort order
    pub modules: Vec<budget_module::Model>,
    /// Active portfolios with active categories and funds
    pub portfolios: Vec<PortfolioNode>,
    /// Transactions not soft-deleted, newest date first
    pub transactions: Vec<transaction::Model>,
}

impl BudgetSnapshot {
    /// The scope mutations against this snapshot run in.
    #[must_use]
    pub fn scope(&self) -> PeriodScope {
        PeriodScope::new(&self.profile, &self.period)
    }

    /// Looks up a live transaction by id.
    #[must_use]
    pub fn transaction(&self, id: &str) -> Option<&transaction::Model> {
        self.transactions.iter().find(|t| t.id == id)
    }
}

/// Loads the snapshot of (user, profile, month, year), creating the period if needed.
///
/// The four loads are independent reads; a mutation racing with them may show up in
/// some parts of the snapshot and not others.
///
/// # Errors
/// * `NotFound` if the profile does not belong to the user
/// * `Validation` for a month or year out of range
/// * `Store` if any load fails
#[instrument(skip(store))]
pub async fn load_snapshot(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
    month: i32,
    year: i32,
) -> Result<BudgetSnapshot> {
    debug!("Fetching budget snapshot");

    let profile = find_profile(store, user_id, profile_id).await?;
    let period = get_or_create_period(store, &profile, month, year).await?;
    let scope = PeriodScope::new(&profile, &period);

    let all_modules = store.list_modules(user_id).await?;
    let budget_config = load_config_view(store, &scope, &all_modules).await?;

    let mut modules: Vec<budget_module::Model> =
        all_modules.into_iter().filter(|m| m.is_active).collect();
    modules.sort_by_key(|m| m.sort_order);

    let portfolios = store.load_portfolio_tree(&scope).await?;
    let transactions = live_transactions(store.list_transactions(&scope).await?);

    info!(
        period_id = %period.id,
        has_config = budget_config.is_some(),
        modules = modules.len(),
        portfolios = portfolios.len(),
        transactions = transactions.len(),
        "Budget snapshot loaded"
    );

    Ok(BudgetSnapshot {
        profile,
        period,
        budget_config,
        modules,
        portfolios,
        transactions,
    })
}

async fn load_config_view(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    modules: &[budget_module::Model],
) -> Result<Option<BudgetConfigView>> {
    let Some(config) = store.find_config(scope).await? else {
        return Ok(None);
    };

    let by_id: HashMap<&str, &budget_module::Model> =
        modules.iter().map(|m| (m.id.as_str(), m)).collect();
    let mut allocations = store.list_allocations(scope, &config.id).await?;
    allocations.sort_by_key(|a| a.created_at);

    let allocations = allocations
        .into_iter()
        .map(|allocation| {
            let module = by_id
                .get(allocation.budget_module_id.as_str())
                .map(|m| (*m).clone());
            AllocationView { allocation, module }
        })
        .collect();

    Ok(Some(BudgetConfigView {
        config,
        allocations,
    }))
}

/// Drops soft-deleted rows and orders by transaction date, newest first.
///
/// Rows on the same date keep creation order, newest first.
fn live_transactions(transactions: Vec<transaction::Model>) -> Vec<transaction::Model> {
    let mut live: Vec<transaction::Model> =
        transactions.into_iter().filter(|t| !t.is_deleted).collect();
    live.sort_by(|a, b| {
        (b.transaction_date, b.created_at).cmp(&(a.transaction_date, a.created_at))
    });
    live
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{
            budget_config::{AllocationInput, BudgetConfigInput, save_budget_config},
            transaction::{NewTransaction, add_transaction, delete_transaction},
        },
        entities::{TransactionStatus, TransactionType},
        errors::Error,
        test_utils::*,
    };
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_snapshot_of_empty_period() {
        for (backend, store) in all_backends().await {
            let (user, profile) = seed_user(store.as_ref()).await;

            let snapshot = load_snapshot(store.as_ref(), &user.id, &profile.id, 3, 2024)
                .await
                .unwrap();

            assert_eq!(snapshot.profile.id, profile.id, "{backend}");
            assert_eq!(snapshot.period.budget_month, 3, "{backend}");
            assert!(snapshot.budget_config.is_none(), "{backend}");
            assert!(snapshot.portfolios.is_empty(), "{backend}");
            assert!(snapshot.transactions.is_empty(), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_unknown_profile_is_not_found() {
        for (backend, store) in all_backends().await {
            let (user, _) = seed_user(store.as_ref()).await;
            let err = load_snapshot(store.as_ref(), &user.id, "ghost", 3, 2024)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NotFound { entity: "profile", .. }), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_nests_portfolio_tree() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let seeded = seed_portfolio_tree(store.as_ref(), &scope).await;

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();

            assert_eq!(snapshot.portfolios.len(), 1, "{backend}");
            let portfolio = &snapshot.portfolios[0];
            assert_eq!(portfolio.portfolio.id, seeded.portfolio.id, "{backend}");
            assert_eq!(portfolio.categories.len(), 1, "{backend}");
            assert_eq!(portfolio.categories[0].category.id, seeded.category.id, "{backend}");
            assert_eq!(portfolio.categories[0].funds.len(), 1, "{backend}");
            assert_eq!(portfolio.categories[0].funds[0].id, seeded.fund.id, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_shape_matches_across_backends() {
        let mut shapes = Vec::new();
        for (_, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            seed_portfolio_tree(store.as_ref(), &scope).await;
            let expense = NewTransaction::new(TransactionType::Expense, "need", 12.5);
            add_transaction(store.as_ref(), &scope, expense)
                .await
                .unwrap();

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();
            let json = serde_json::to_value(&snapshot).unwrap();
            shapes.push(shape_of(&json));
        }
        assert_eq!(shapes[0], shapes[1]);
    }

    /// Replaces every leaf with its JSON type name.
    fn shape_of(value: &serde_json::Value) -> serde_json::Value {
        use serde_json::Value;
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), shape_of(v)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(shape_of).collect()),
            Value::Null => Value::String("null".into()),
            Value::Bool(_) => Value::String("bool".into()),
            Value::Number(_) => Value::String("number".into()),
            Value::String(_) => Value::String("string".into()),
        }
    }

    #[tokio::test]
    async fn test_snapshot_joins_allocations_to_modules() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let need = seed_module(store.as_ref(), &scope.user_id, "need", 1).await;
            let want = seed_module(store.as_ref(), &scope.user_id, "want", 2).await;

            save_budget_config(
                store.as_ref(),
                &scope,
                BudgetConfigInput {
                    monthly_salary: 5000.0,
                    budget_percentage: 80.0,
                    allocations: vec![
                        AllocationInput::new(&need.id, 60.0),
                        AllocationInput::new(&want.id, 40.0),
                    ],
                },
            )
            .await
            .unwrap();

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();

            let view = snapshot.budget_config.unwrap();
            assert_eq!(view.config.total_budget_amount, 4000.0, "{backend}");
            assert_eq!(view.allocations.len(), 2, "{backend}");
            for allocation in &view.allocations {
                let module = allocation.module.as_ref().unwrap();
                assert_eq!(module.id, allocation.allocation.budget_module_id, "{backend}");
            }
            let modules: Vec<&str> = snapshot
                .modules
                .iter()
                .map(|m| m.module_name.as_str())
                .collect();
            assert_eq!(modules, ["need", "want"], "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_lists_newest_transaction_first() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let mut older = NewTransaction::new(TransactionType::Income, "salary", 3000.0);
            older.transaction_date = NaiveDate::from_ymd_opt(2024, 3, 1);
            add_transaction(store.as_ref(), &scope, older).await.unwrap();

            let added = add_transaction(
                store.as_ref(),
                &scope,
                NewTransaction::new(TransactionType::Expense, "need", 50.0),
            )
            .await
            .unwrap();

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();

            let first = &snapshot.transactions[0];
            assert_eq!(first.id, added.id, "{backend}");
            assert_eq!(first.status, TransactionStatus::Active, "{backend}");
            assert!(!first.is_deleted, "{backend}");
            assert_eq!(snapshot.transactions.len(), 2, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_ties_keep_creation_order() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let mut ids = Vec::new();
            for amount in [1.0, 2.0, 3.0] {
                let mut input = NewTransaction::new(TransactionType::Expense, "want", amount);
                input.transaction_date = NaiveDate::from_ymd_opt(2024, 3, 10);
                ids.push(add_transaction(store.as_ref(), &scope, input).await.unwrap().id);
            }

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();
            let listed: Vec<String> = snapshot.transactions.iter().map(|t| t.id.clone()).collect();
            ids.reverse();
            assert_eq!(listed, ids, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_snapshot_hides_soft_deleted_transactions() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let doomed = add_transaction(
                store.as_ref(),
                &scope,
                NewTransaction::new(TransactionType::Expense, "want", 20.0),
            )
            .await
            .unwrap();
            delete_transaction(store.as_ref(), &scope, &doomed.id).await.unwrap();

            let snapshot = load_snapshot(
                store.as_ref(),
                &scope.user_id,
                &scope.profile_id,
                scope.month,
                scope.year,
            )
            .await
            .unwrap();
            assert!(snapshot.transaction(&doomed.id).is_none(), "{backend}");
        }
    }
}

//! Budget config and allocation business logic.
//!
//! A period has at most one config. Saving replaces it, keeping its id, and then
//! replaces the whole allocation set: every allocation is deleted and the new ones are
//! inserted with amounts recomputed from the fresh total. The two steps are not atomic
//! and assume no concurrent writer on the same period.

use crate::{
    core::AMOUNT_EPSILON,
    entities::{budget_allocation, budget_config},
    errors::{Error, Result},
    store::{BudgetStore, PeriodScope},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Share of the budget given to one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationInput {
    /// Module receiving the share
    pub budget_module_id: String,
    /// Percentage of the total budget, 0-100
    pub allocation_percentage: f64,
}

impl AllocationInput {
    /// Allocates `allocation_percentage` of the budget to a module.
    pub fn new(budget_module_id: impl Into<String>, allocation_percentage: f64) -> Self {
        Self {
            budget_module_id: budget_module_id.into(),
            allocation_percentage,
        }
    }
}

/// Everything needed to save a period's config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfigInput {
    /// Monthly income
    pub monthly_salary: f64,
    /// Share of the salary that is budgeted, 0-100
    pub budget_percentage: f64,
    /// Allocation set replacing the current one
    #[serde(default)]
    pub allocations: Vec<AllocationInput>,
}

fn validate_percentage(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(Error::validation(
            field,
            format!("must be between 0 and 100, got {value}"),
        ));
    }
    Ok(())
}

/// Checks the ranges of the input and that allocations add up to at most 100%.
pub fn validate_budget_config(input: &BudgetConfigInput) -> Result<()> {
    if !input.monthly_salary.is_finite() || input.monthly_salary < 0.0 {
        return Err(Error::validation(
            "monthly_salary",
            format!("must be a non-negative amount, got {}", input.monthly_salary),
        ));
    }
    validate_percentage("budget_percentage", input.budget_percentage)?;

    let mut seen = HashSet::new();
    for allocation in &input.allocations {
        validate_percentage("allocations", allocation.allocation_percentage)?;
        if !seen.insert(allocation.budget_module_id.as_str()) {
            return Err(Error::validation(
                "allocations",
                format!("module {} is allocated twice", allocation.budget_module_id),
            ));
        }
    }

    let total: f64 = input
        .allocations
        .iter()
        .map(|a| a.allocation_percentage)
        .sum();
    if total > 100.0 + AMOUNT_EPSILON {
        return Err(Error::validation(
            "allocations",
            format!("percentages add up to {total}, more than 100"),
        ));
    }
    Ok(())
}

/// Saves the config of the period and replaces its allocations.
///
/// The total budget amount is `monthly_salary * budget_percentage / 100` and each
/// allocated amount is computed from that total. Every allocated module must belong to
/// the user.
#[instrument(skip(store, scope, input), fields(period_id = %scope.period_id))]
pub async fn save_budget_config(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    input: BudgetConfigInput,
) -> Result<budget_config::Model> {
    if let Err(err) = validate_budget_config(&input) {
        warn!("Rejected budget config: {err}");
        return Err(err);
    }

    let modules = store.list_modules(&scope.user_id).await?;
    if let Some(unknown) = input
        .allocations
        .iter()
        .find(|a| !modules.iter().any(|m| m.id == a.budget_module_id))
    {
        return Err(Error::not_found(
            "budget_module",
            &unknown.budget_module_id,
        ));
    }

    let now = Utc::now();
    let existing = store.find_config(scope).await?;
    let total = budget_config::total_budget_amount(input.monthly_salary, input.budget_percentage);

    let config = budget_config::Model {
        id: existing
            .as_ref()
            .map_or_else(|| Uuid::new_v4().to_string(), |c| c.id.clone()),
        user_id: scope.user_id.clone(),
        profile_id: scope.profile_id.clone(),
        budget_period_id: scope.period_id.clone(),
        monthly_salary: input.monthly_salary,
        budget_percentage: input.budget_percentage,
        total_budget_amount: total,
        created_at: existing.map_or(now, |c| c.created_at),
        updated_at: now,
    };
    let config = store.save_config(scope, config).await?;

    store.delete_allocations(scope, &config.id).await?;
    let allocations: Vec<budget_allocation::Model> = input
        .allocations
        .into_iter()
        .map(|a| budget_allocation::Model {
            id: Uuid::new_v4().to_string(),
            budget_config_id: config.id.clone(),
            budget_module_id: a.budget_module_id,
            allocation_percentage: a.allocation_percentage,
            allocated_amount: total * a.allocation_percentage / 100.0,
            created_at: now,
        })
        .collect();
    let count = allocations.len();
    store.insert_allocations(scope, allocations).await?;

    info!(config_id = %config.id, total, allocations = count, "Saved budget config");
    Ok(config)
}

/// Removes the period's config and all of its allocations.
#[instrument(skip(store, scope), fields(period_id = %scope.period_id))]
pub async fn delete_budget_config(store: &dyn BudgetStore, scope: &PeriodScope) -> Result<()> {
    store.delete_config(scope).await?;
    info!("Deleted budget config");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn input(allocations: Vec<AllocationInput>) -> BudgetConfigInput {
        BudgetConfigInput {
            monthly_salary: 10_000.0,
            budget_percentage: 50.0,
            allocations,
        }
    }

    #[test]
    fn test_validation_rejects_bad_ranges() {
        let mut bad_salary = input(vec![]);
        bad_salary.monthly_salary = -1.0;
        assert!(matches!(
            validate_budget_config(&bad_salary),
            Err(Error::Validation { field: "monthly_salary", .. })
        ));

        let mut bad_pct = input(vec![]);
        bad_pct.budget_percentage = 120.0;
        assert!(matches!(
            validate_budget_config(&bad_pct),
            Err(Error::Validation { field: "budget_percentage", .. })
        ));

        let over = input(vec![AllocationInput::new("a", 70.0), AllocationInput::new("b", 40.0)]);
        assert!(matches!(
            validate_budget_config(&over),
            Err(Error::Validation { field: "allocations", .. })
        ));

        let twice = input(vec![AllocationInput::new("a", 10.0), AllocationInput::new("a", 10.0)]);
        assert!(matches!(
            validate_budget_config(&twice),
            Err(Error::Validation { field: "allocations", .. })
        ));

        let exact = input(vec![AllocationInput::new("a", 33.3), AllocationInput::new("b", 66.7)]);
        assert!(validate_budget_config(&exact).is_ok());
    }

    #[tokio::test]
    async fn test_save_computes_amounts() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let need = seed_module(store.as_ref(), &scope.user_id, "need", 1).await;

            let config = save_budget_config(
                store.as_ref(),
                &scope,
                input(vec![AllocationInput::new(&need.id, 40.0)]),
            )
            .await
            .unwrap();

            assert_eq!(config.total_budget_amount, 5000.0, "{backend}");
            let allocations = store.list_allocations(&scope, &config.id).await.unwrap();
            assert_eq!(allocations.len(), 1, "{backend}");
            assert_eq!(allocations[0].allocated_amount, 2000.0, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_save_replaces_allocation_set() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let need = seed_module(store.as_ref(), &scope.user_id, "need", 1).await;
            let want = seed_module(store.as_ref(), &scope.user_id, "want", 2).await;
            let savings = seed_module(store.as_ref(), &scope.user_id, "savings", 3).await;

            let first = save_budget_config(
                store.as_ref(),
                &scope,
                input(vec![AllocationInput::new(&need.id, 50.0)]),
            )
            .await
            .unwrap();
            let second = save_budget_config(
                store.as_ref(),
                &scope,
                input(vec![
                    AllocationInput::new(&want.id, 30.0),
                    AllocationInput::new(&savings.id, 20.0),
                ]),
            )
            .await
            .unwrap();

            assert_eq!(first.id, second.id, "{backend}");
            assert_eq!(first.created_at, second.created_at, "{backend}");
            let mut modules: Vec<String> = store
                .list_allocations(&scope, &second.id)
                .await
                .unwrap()
                .into_iter()
                .map(|a| a.budget_module_id)
                .collect();
            modules.sort();
            let mut expected = vec![want.id.clone(), savings.id.clone()];
            expected.sort();
            assert_eq!(modules, expected, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_save_rejects_foreign_module() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let err = save_budget_config(
                store.as_ref(),
                &scope,
                input(vec![AllocationInput::new("not-mine", 10.0)]),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::NotFound { entity: "budget_module", .. }), "{backend}");
            assert!(store.find_config(&scope).await.unwrap().is_none(), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_delete_budget_config() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;
            let need = seed_module(store.as_ref(), &scope.user_id, "need", 1).await;
            let config = save_budget_config(
                store.as_ref(),
                &scope,
                input(vec![AllocationInput::new(&need.id, 50.0)]),
            )
            .await
            .unwrap();

            delete_budget_config(store.as_ref(), &scope).await.unwrap();

            assert!(store.find_config(&scope).await.unwrap().is_none(), "{backend}");
            let allocations = store.list_allocations(&scope, &config.id).await.unwrap();
            assert!(allocations.is_empty(), "{backend}");
            // Deleting again is harmless
            delete_budget_config(store.as_ref(), &scope).await.unwrap();
        }
    }
}

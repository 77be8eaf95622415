//! Configuration inheritance - Copying a period's plan into another period.
//!
//! The audit record is appended before any copying starts and is never rolled back.
//! If a copy step fails, the record and whatever was already copied stay in place, so
//! callers should treat inheritance as best-effort.

use crate::{
    core::period::scope_for_period_id,
    entities::{
        InheritedComponent, budget_allocation, budget_config, configuration_inheritance,
        investment_category, investment_fund, investment_portfolio,
    },
    errors::{Error, Result},
    store::{BudgetStore, PeriodScope},
};
use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Copies `components` of the source period into `target`.
///
/// * `BudgetConfig` - the config's scalar fields and every allocation, amounts copied
///   as they are. The target keeps its config id if it already had one and its
///   allocations are replaced.
/// * `InvestmentPortfolios` - every active portfolio with its active categories and
///   funds, appended to the target with fresh ids and `invested_amount` reset to zero.
///
/// The audit record is appended before any copy and is kept if a copy fails. A request
/// that cannot copy anything (no components, or a period inheriting from itself) is
/// rejected before that point and leaves no audit record.
///
/// Returns the audit record.
///
/// # Errors
/// * `Validation` for an empty component list or a source equal to the target
/// * `NotFound` if the source period is not the user's (after the audit is written)
/// * `Store` if any read or write fails
#[instrument(skip(store, target), fields(target_period_id = %target.period_id))]
pub async fn inherit_configuration(
    store: &dyn BudgetStore,
    target: &PeriodScope,
    source_period_id: &str,
    components: &[InheritedComponent],
) -> Result<configuration_inheritance::Model> {
    let mut components = components.to_vec();
    components.sort();
    components.dedup();
    if components.is_empty() {
        return Err(Error::validation("components", "nothing to inherit"));
    }
    if source_period_id == target.period_id {
        return Err(Error::validation(
            "source_period_id",
            "a period cannot inherit from itself",
        ));
    }

    let record = store
        .insert_inheritance(configuration_inheritance::Model {
            id: Uuid::new_v4().to_string(),
            user_id: target.user_id.clone(),
            profile_id: target.profile_id.clone(),
            source_budget_period_id: source_period_id.to_string(),
            target_budget_period_id: target.period_id.clone(),
            inherited_components: components
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(","),
            created_at: Utc::now(),
        })
        .await?;
    debug!(record_id = %record.id, "Recorded configuration inheritance");

    let source = scope_for_period_id(store, &target.user_id, source_period_id).await?;

    for component in &components {
        match component {
            InheritedComponent::BudgetConfig => copy_budget_config(store, &source, target).await?,
            InheritedComponent::InvestmentPortfolios => {
                copy_portfolios(store, &source, target).await?;
            }
        }
    }

    info!(
        source_period_id,
        components = %record.inherited_components,
        "Inherited configuration"
    );
    Ok(record)
}

async fn copy_budget_config(
    store: &dyn BudgetStore,
    source: &PeriodScope,
    target: &PeriodScope,
) -> Result<()> {
    let Some(original) = store.find_config(source).await? else {
        debug!("Source period has no budget config");
        return Ok(());
    };

    let now = Utc::now();
    let existing = store.find_config(target).await?;
    let config = store
        .save_config(
            target,
            budget_config::Model {
                id: existing
                    .as_ref()
                    .map_or_else(|| Uuid::new_v4().to_string(), |c| c.id.clone()),
                user_id: target.user_id.clone(),
                profile_id: target.profile_id.clone(),
                budget_period_id: target.period_id.clone(),
                monthly_salary: original.monthly_salary,
                budget_percentage: original.budget_percentage,
                total_budget_amount: original.total_budget_amount,
                created_at: existing.map_or(now, |c| c.created_at),
                updated_at: now,
            },
        )
        .await?;

    store.delete_allocations(target, &config.id).await?;
    let allocations: Vec<budget_allocation::Model> = store
        .list_allocations(source, &original.id)
        .await?
        .into_iter()
        .map(|a| budget_allocation::Model {
            id: Uuid::new_v4().to_string(),
            budget_config_id: config.id.clone(),
            created_at: Utc::now(),
            ..a
        })
        .collect();
    let count = allocations.len();
    store.insert_allocations(target, allocations).await?;
    debug!(config_id = %config.id, allocations = count, "Copied budget config");
    Ok(())
}

async fn copy_portfolios(
    store: &dyn BudgetStore,
    source: &PeriodScope,
    target: &PeriodScope,
) -> Result<()> {
    let tree = store.load_portfolio_tree(source).await?;
    let count = tree.len();

    for node in tree {
        let now = Utc::now();
        let portfolio = store
            .insert_portfolio(
                target,
                investment_portfolio::Model {
                    id: Uuid::new_v4().to_string(),
                    user_id: target.user_id.clone(),
                    profile_id: target.profile_id.clone(),
                    budget_period_id: target.period_id.clone(),
                    invested_amount: 0.0,
                    created_at: now,
                    updated_at: now,
                    ..node.portfolio
                },
            )
            .await?;

        for child in node.categories {
            let now = Utc::now();
            let category = store
                .insert_category(
                    target,
                    investment_category::Model {
                        id: Uuid::new_v4().to_string(),
                        portfolio_id: portfolio.id.clone(),
                        invested_amount: 0.0,
                        created_at: now,
                        updated_at: now,
                        ..child.category
                    },
                )
                .await?;

            for fund in child.funds {
                let now = Utc::now();
                store
                    .insert_fund(
                        target,
                        investment_fund::Model {
                            id: Uuid::new_v4().to_string(),
                            category_id: category.id.clone(),
                            invested_amount: 0.0,
                            created_at: now,
                            updated_at: now,
                            ..fund
                        },
                    )
                    .await?;
            }
        }
    }

    debug!(portfolios = count, "Copied investment portfolios");
    Ok(())
}

/// Lists the inheritance records of a profile, oldest first.
pub async fn list_inheritances(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
) -> Result<Vec<configuration_inheritance::Model>> {
    store.list_inheritances(user_id, profile_id).await
}

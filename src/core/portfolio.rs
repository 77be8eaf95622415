//! Investment portfolio business logic.
//!
//! Portfolios belong to a period and own categories, which own funds. Every operation
//! is scoped to one period: ids from another period are reported as not found.

use crate::{
    entities::{AllocationType, investment_category, investment_fund, investment_portfolio},
    errors::{Error, Result},
    store::{BudgetStore, PeriodScope},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

/// A new portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioInput {
    /// Portfolio name; names are not deduplicated
    pub name: String,
    /// How `allocation_value` is read
    pub allocation_type: AllocationType,
    /// Percentage or amount
    pub allocation_value: f64,
    /// Planned amount
    pub allocated_amount: f64,
    /// Already invested, usually 0
    #[serde(default)]
    pub invested_amount: f64,
    /// Whether uncategorized investing is allowed
    #[serde(default)]
    pub allow_direct_investment: bool,
}

impl PortfolioInput {
    /// A portfolio with nothing invested and direct investment disabled.
    pub fn new(
        name: impl Into<String>,
        allocation_type: AllocationType,
        allocation_value: f64,
        allocated_amount: f64,
    ) -> Self {
        Self {
            name: name.into(),
            allocation_type,
            allocation_value,
            allocated_amount,
            invested_amount: 0.0,
            allow_direct_investment: false,
        }
    }
}

/// A new category under a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInput {
    /// Category name
    pub name: String,
    /// How `allocation_value` is read
    pub allocation_type: AllocationType,
    /// Percentage or amount
    pub allocation_value: f64,
    /// Planned amount
    pub allocated_amount: f64,
    /// Already invested, usually 0
    #[serde(default)]
    pub invested_amount: f64,
}

impl CategoryInput {
    /// A category with nothing invested.
    pub fn new(
        name: impl Into<String>,
        allocation_type: AllocationType,
        allocation_value: f64,
        allocated_amount: f64,
    ) -> Self {
        Self {
            name: name.into(),
            allocation_type,
            allocation_value,
            allocated_amount,
            invested_amount: 0.0,
        }
    }
}

/// A new fund under a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundInput {
    /// Fund name
    pub name: String,
    /// Planned amount
    pub allocated_amount: f64,
    /// Already invested, usually 0
    #[serde(default)]
    pub invested_amount: f64,
}

impl FundInput {
    /// A fund with nothing invested.
    pub fn new(name: impl Into<String>, allocated_amount: f64) -> Self {
        Self {
            name: name.into(),
            allocated_amount,
            invested_amount: 0.0,
        }
    }
}

/// Fields of a portfolio that may be changed; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPatch {
    /// New name
    pub name: Option<String>,
    /// New allocation type
    pub allocation_type: Option<AllocationType>,
    /// New allocation value
    pub allocation_value: Option<f64>,
    /// New planned amount
    pub allocated_amount: Option<f64>,
    /// New invested amount
    pub invested_amount: Option<f64>,
    /// New direct investment flag
    pub allow_direct_investment: Option<bool>,
    /// Activate or deactivate
    pub is_active: Option<bool>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    Ok(())
}

fn validate_amount(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(
            field,
            format!("must be a non-negative amount, got {value}"),
        ));
    }
    Ok(())
}

fn validate_allocation(allocation_type: AllocationType, value: f64) -> Result<()> {
    validate_amount("allocation_value", value)?;
    if allocation_type == AllocationType::Percentage && value > 100.0 {
        return Err(Error::validation(
            "allocation_value",
            format!("percentage must not exceed 100, got {value}"),
        ));
    }
    Ok(())
}

/// Appends a portfolio to the period.
#[instrument(skip(store, scope, input), fields(period_id = %scope.period_id, name = %input.name))]
pub async fn save_investment_portfolio(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    input: PortfolioInput,
) -> Result<investment_portfolio::Model> {
    validate_name(&input.name)?;
    validate_allocation(input.allocation_type, input.allocation_value)?;
    validate_amount("allocated_amount", input.allocated_amount)?;
    validate_amount("invested_amount", input.invested_amount)?;

    let now = Utc::now();
    let portfolio = store
        .insert_portfolio(
            scope,
            investment_portfolio::Model {
                id: Uuid::new_v4().to_string(),
                user_id: scope.user_id.clone(),
                profile_id: scope.profile_id.clone(),
                budget_period_id: scope.period_id.clone(),
                name: input.name.trim().to_string(),
                allocation_type: input.allocation_type,
                allocation_value: input.allocation_value,
                allocated_amount: input.allocated_amount,
                invested_amount: input.invested_amount,
                allow_direct_investment: input.allow_direct_investment,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    info!(portfolio_id = %portfolio.id, "Saved investment portfolio");
    Ok(portfolio)
}

/// Applies `patch` to a portfolio of the period.
pub async fn update_investment_portfolio(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    portfolio_id: &str,
    patch: PortfolioPatch,
) -> Result<investment_portfolio::Model> {
    let current = store
        .list_portfolios(scope)
        .await?
        .into_iter()
        .find(|p| p.id == portfolio_id)
        .ok_or_else(|| Error::not_found("investment_portfolio", portfolio_id))?;

    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    let allocation_type = patch.allocation_type.unwrap_or(current.allocation_type);
    let allocation_value = patch.allocation_value.unwrap_or(current.allocation_value);
    validate_allocation(allocation_type, allocation_value)?;
    if let Some(amount) = patch.allocated_amount {
        validate_amount("allocated_amount", amount)?;
    }
    if let Some(amount) = patch.invested_amount {
        validate_amount("invested_amount", amount)?;
    }

    let updated = investment_portfolio::Model {
        name: patch.name.map_or(current.name, |n| n.trim().to_string()),
        allocation_type,
        allocation_value,
        allocated_amount: patch.allocated_amount.unwrap_or(current.allocated_amount),
        invested_amount: patch.invested_amount.unwrap_or(current.invested_amount),
        allow_direct_investment: patch
            .allow_direct_investment
            .unwrap_or(current.allow_direct_investment),
        is_active: patch.is_active.unwrap_or(current.is_active),
        updated_at: Utc::now(),
        ..current
    };
    let updated = store.update_portfolio(scope, updated).await?;
    info!(portfolio_id, "Updated investment portfolio");
    Ok(updated)
}

/// Removes a portfolio of the period with its categories and funds.
pub async fn delete_investment_portfolio(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    portfolio_id: &str,
) -> Result<()> {
    store.delete_portfolio(scope, portfolio_id).await?;
    info!(portfolio_id, "Deleted investment portfolio");
    Ok(())
}

/// Removes every portfolio, category and fund of the period.
pub async fn delete_all_investment_portfolios(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
) -> Result<()> {
    store.delete_all_portfolios(scope).await?;
    info!(period_id = %scope.period_id, "Deleted all investment portfolios");
    Ok(())
}

/// Adds a category to a portfolio of the period.
pub async fn add_investment_category(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    portfolio_id: &str,
    input: CategoryInput,
) -> Result<investment_category::Model> {
    validate_name(&input.name)?;
    validate_allocation(input.allocation_type, input.allocation_value)?;
    validate_amount("allocated_amount", input.allocated_amount)?;
    validate_amount("invested_amount", input.invested_amount)?;

    if !store
        .list_portfolios(scope)
        .await?
        .iter()
        .any(|p| p.id == portfolio_id)
    {
        return Err(Error::not_found("investment_portfolio", portfolio_id));
    }

    let now = Utc::now();
    let category = store
        .insert_category(
            scope,
            investment_category::Model {
                id: Uuid::new_v4().to_string(),
                portfolio_id: portfolio_id.to_string(),
                name: input.name.trim().to_string(),
                allocation_type: input.allocation_type,
                allocation_value: input.allocation_value,
                allocated_amount: input.allocated_amount,
                invested_amount: input.invested_amount,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    info!(category_id = %category.id, portfolio_id, "Added investment category");
    Ok(category)
}

/// Adds a fund to a category of the period.
pub async fn add_investment_fund(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    category_id: &str,
    input: FundInput,
) -> Result<investment_fund::Model> {
    validate_name(&input.name)?;
    validate_amount("allocated_amount", input.allocated_amount)?;
    validate_amount("invested_amount", input.invested_amount)?;

    if !store
        .list_categories(scope)
        .await?
        .iter()
        .any(|c| c.id == category_id)
    {
        return Err(Error::not_found("investment_category", category_id));
    }

    let now = Utc::now();
    let fund = store
        .insert_fund(
            scope,
            investment_fund::Model {
                id: Uuid::new_v4().to_string(),
                category_id: category_id.to_string(),
                name: input.name.trim().to_string(),
                allocated_amount: input.allocated_amount,
                invested_amount: input.invested_amount,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    info!(fund_id = %fund.id, category_id, "Added investment fund");
    Ok(fund)
}

/// Replaces the period's investment plan: clears every portfolio, then saves `plan`.
///
/// The inputs are validated before anything is removed.
#[instrument(
    skip(store, scope, plan),
    fields(period_id = %scope.period_id, portfolios = plan.len())
)]
pub async fn replace_investment_plan(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    plan: Vec<PortfolioInput>,
) -> Result<Vec<investment_portfolio::Model>> {
    for input in &plan {
        validate_name(&input.name)?;
        validate_allocation(input.allocation_type, input.allocation_value)?;
        validate_amount("allocated_amount", input.allocated_amount)?;
        validate_amount("invested_amount", input.invested_amount)?;
    }

    store.delete_all_portfolios(scope).await?;
    let mut saved = Vec::with_capacity(plan.len());
    for input in plan {
        saved.push(save_investment_portfolio(store, scope, input).await?);
    }
    Ok(saved)
}

//! Shared test utilities.
//!
//! Helpers for building both stores and seeding rows with sensible defaults. The
//! `seed_*` helpers panic on failure so tests can stay focused on the behaviour under
//! test.
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

use crate::{
    core::period::{get_or_create_period, resolve_scope},
    entities::{
        AllocationType, TransactionStatus, TransactionType, budget_allocation, budget_config,
        budget_module, investment_category, investment_fund, investment_portfolio, profile,
        transaction, user,
    },
    errors::Result,
    store::{BudgetStore, FlatStore, MemoryEngine, PeriodScope, RelationalStore},
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Creates an in-memory `SQLite` relational store with all tables initialized.
pub async fn setup_relational_store() -> Result<RelationalStore> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(RelationalStore::new(db))
}

/// Creates an empty flat store on the in-memory engine, namespace `lb`.
#[must_use]
pub fn setup_flat_store() -> FlatStore<MemoryEngine> {
    FlatStore::new(MemoryEngine::default(), "lb")
}

/// One fresh store per backend, labelled for assertion messages.
///
/// Behaviour that must not depend on the backend is tested by looping over these.
pub async fn all_backends() -> Vec<(&'static str, Arc<dyn BudgetStore>)> {
    init_test_tracing();
    vec![
        ("flat", Arc::new(setup_flat_store())),
        ("relational", Arc::new(setup_relational_store().await.unwrap())),
    ]
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Inserts a user with a primary profile named `Primary`.
///
/// The user has no system modules; seed them explicitly when a test needs them.
pub async fn seed_user(store: &dyn BudgetStore) -> (user::Model, profile::Model) {
    let now = Utc::now();
    let user_id = Uuid::new_v4().to_string();
    let user = store
        .insert_user(
            user::Model {
                id: user_id.clone(),
                email: format!("{user_id}@example.com"),
                full_name: Some("Test User".to_string()),
                created_at: now,
                updated_at: now,
            },
            "not-a-real-hash".to_string(),
        )
        .await
        .unwrap();
    let profile = store
        .insert_profile(profile::Model {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            profile_name: "Primary".to_string(),
            display_name: Some("Primary Profile".to_string()),
            is_primary: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    (user, profile)
}

/// Seeds a user and resolves its primary profile's March 2024 period.
pub async fn seed_scope(store: &dyn BudgetStore) -> PeriodScope {
    let (user, profile) = seed_user(store).await;
    resolve_scope(store, &user.id, &profile.id, 3, 2024)
        .await
        .unwrap()
}

/// Resolves another period of the same profile as `scope`.
pub async fn seed_period(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    month: i32,
    year: i32,
) -> PeriodScope {
    let profile = store
        .find_profile(&scope.user_id, &scope.profile_id)
        .await
        .unwrap()
        .unwrap();
    let period = get_or_create_period(store, &profile, month, year)
        .await
        .unwrap();
    PeriodScope::new(&profile, &period)
}

/// Inserts an active, non-system budget module.
pub async fn seed_module(
    store: &dyn BudgetStore,
    user_id: &str,
    name: &str,
    sort_order: i32,
) -> budget_module::Model {
    store
        .insert_module(budget_module::Model {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module_name: name.to_string(),
            display_name: name.to_uppercase(),
            include_in_budget: true,
            is_system_module: false,
            is_active: true,
            sort_order,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

/// Builds (without storing) an active expense in `scope`.
#[must_use]
pub fn sample_transaction(scope: &PeriodScope, amount: f64) -> transaction::Model {
    let now = Utc::now();
    transaction::Model {
        id: Uuid::new_v4().to_string(),
        user_id: scope.user_id.clone(),
        profile_id: scope.profile_id.clone(),
        budget_period_id: scope.period_id.clone(),
        budget_month: scope.month,
        budget_year: scope.year,
        transaction_type: TransactionType::Expense,
        category: "need".to_string(),
        amount,
        description: Some("Test transaction".to_string()),
        notes: None,
        transaction_date: NaiveDate::from_ymd_opt(scope.year, scope.month.unsigned_abs(), 15)
            .unwrap(),
        payment_method: None,
        spent_for: None,
        tag: None,
        portfolio_id: None,
        investment_category_id: None,
        fund_id: None,
        refund_for: None,
        original_transaction_id: None,
        status: TransactionStatus::Active,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

/// Builds (without storing) a config of 50000 salary with an 80% budget.
#[must_use]
pub fn sample_config(scope: &PeriodScope) -> budget_config::Model {
    let now = Utc::now();
    budget_config::Model {
        id: Uuid::new_v4().to_string(),
        user_id: scope.user_id.clone(),
        profile_id: scope.profile_id.clone(),
        budget_period_id: scope.period_id.clone(),
        monthly_salary: 50_000.0,
        budget_percentage: 80.0,
        total_budget_amount: 40_000.0,
        created_at: now,
        updated_at: now,
    }
}

/// Builds (without storing) an allocation of `percentage` of a 40000 total.
#[must_use]
pub fn sample_allocation(
    config_id: &str,
    module_id: &str,
    percentage: f64,
) -> budget_allocation::Model {
    budget_allocation::Model {
        id: Uuid::new_v4().to_string(),
        budget_config_id: config_id.to_string(),
        budget_module_id: module_id.to_string(),
        allocation_percentage: percentage,
        allocated_amount: 40_000.0 * percentage / 100.0,
        created_at: Utc::now(),
    }
}

/// Rows stored by [`seed_portfolio_tree`].
#[derive(Debug, Clone)]
pub struct SeededTree {
    /// Allocated 1000, invested 500
    pub portfolio: investment_portfolio::Model,
    /// Allocated 600, invested 300
    pub category: investment_category::Model,
    /// Allocated 600, invested 300
    pub fund: investment_fund::Model,
}

/// Stores one portfolio holding one category holding one fund, all active.
pub async fn seed_portfolio_tree(store: &dyn BudgetStore, scope: &PeriodScope) -> SeededTree {
    let now = Utc::now();
    let portfolio = store
        .insert_portfolio(
            scope,
            investment_portfolio::Model {
                id: Uuid::new_v4().to_string(),
                user_id: scope.user_id.clone(),
                profile_id: scope.profile_id.clone(),
                budget_period_id: scope.period_id.clone(),
                name: "Equity".to_string(),
                allocation_type: AllocationType::Amount,
                allocation_value: 1000.0,
                allocated_amount: 1000.0,
                invested_amount: 500.0,
                allow_direct_investment: false,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
    let category = store
        .insert_category(
            scope,
            investment_category::Model {
                id: Uuid::new_v4().to_string(),
                portfolio_id: portfolio.id.clone(),
                name: "Index funds".to_string(),
                allocation_type: AllocationType::Percentage,
                allocation_value: 60.0,
                allocated_amount: 600.0,
                invested_amount: 300.0,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
    let fund = store
        .insert_fund(
            scope,
            investment_fund::Model {
                id: Uuid::new_v4().to_string(),
                category_id: category.id.clone(),
                name: "Total market".to_string(),
                allocated_amount: 600.0,
                invested_amount: 300.0,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
    SeededTree {
        portfolio,
        category,
        fund,
    }
}

//! Transaction business logic - Recording, editing, soft-deleting and refunding.
//!
//! Transactions are never removed one by one: deletion sets `is_deleted` and
//! `deleted_at`, and the row stays in storage. Status moves only away from `active`.
//! Users may cancel a transaction; the refunded states are set by
//! [`refund_transaction`] alone.

use crate::{
    core::{AMOUNT_EPSILON, period::validate_budget_month},
    entities::{PaymentMethod, TransactionStatus, TransactionType, transaction},
    errors::{Error, Result},
    store::{BudgetStore, PeriodScope},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A transaction to record.
///
/// Build it with [`NewTransaction::new`] and set the optional fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Kind of money movement
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Budget category tag, e.g. `"need"`
    pub category: String,
    /// Positive amount
    pub amount: f64,
    /// Free text description
    pub description: Option<String>,
    /// Longer notes
    pub notes: Option<String>,
    /// Date of the movement; today (UTC) when absent
    pub transaction_date: Option<NaiveDate>,
    /// How it was paid
    pub payment_method: Option<PaymentMethod>,
    /// Who or what the money was spent for
    pub spent_for: Option<String>,
    /// Free-form tag
    pub tag: Option<String>,
    /// Linked portfolio
    pub portfolio_id: Option<String>,
    /// Linked investment category
    pub investment_category_id: Option<String>,
    /// Linked fund
    pub fund_id: Option<String>,
    /// Initial status; `active` when absent
    pub status: Option<TransactionStatus>,
}

impl NewTransaction {
    /// A transaction dated today with every optional field empty.
    pub fn new(
        transaction_type: TransactionType,
        category: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            transaction_type,
            category: category.into(),
            amount,
            description: None,
            notes: None,
            transaction_date: None,
            payment_method: None,
            spent_for: None,
            tag: None,
            portfolio_id: None,
            investment_category_id: None,
            fund_id: None,
            status: None,
        }
    }
}

/// Fields of a transaction that may be changed; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    /// New kind
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// New category tag
    pub category: Option<String>,
    /// New amount
    pub amount: Option<f64>,
    /// New description
    pub description: Option<String>,
    /// New notes
    pub notes: Option<String>,
    /// New date
    pub transaction_date: Option<NaiveDate>,
    /// New payment method
    pub payment_method: Option<PaymentMethod>,
    /// New beneficiary
    pub spent_for: Option<String>,
    /// New tag
    pub tag: Option<String>,
    /// New portfolio link
    pub portfolio_id: Option<String>,
    /// New investment category link
    pub investment_category_id: Option<String>,
    /// New fund link
    pub fund_id: Option<String>,
    /// New status; only `cancelled` is accepted, and only from `active`
    pub status: Option<TransactionStatus>,
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::validation(
            "amount",
            format!("must be a positive amount, got {amount}"),
        ));
    }
    Ok(())
}

/// Finds a live (not soft-deleted) transaction of the period.
async fn find_live(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    transaction_id: &str,
) -> Result<transaction::Model> {
    store
        .list_transactions(scope)
        .await?
        .into_iter()
        .find(|t| t.id == transaction_id && !t.is_deleted)
        .ok_or_else(|| Error::not_found("transaction", transaction_id))
}

/// Records a transaction in the period.
///
/// # Errors
/// * `Validation` if the period's month or year is out of range, the amount is not
///   positive, or the initial status is a refund state
/// * `Store` if the insert fails
#[instrument(
    skip(store, scope, input),
    fields(period_id = %scope.period_id, month = scope.month, year = scope.year)
)]
pub async fn add_transaction(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    input: NewTransaction,
) -> Result<transaction::Model> {
    if let Err(err) = validate_budget_month(scope.month, scope.year) {
        warn!("Rejected transaction: {err}");
        return Err(err);
    }
    validate_amount(input.amount)?;
    let status = input.status.unwrap_or(TransactionStatus::Active);
    if status.is_refund_state() {
        return Err(Error::validation(
            "status",
            "refund states are set by the refund workflow only",
        ));
    }

    let now = Utc::now();
    let transaction = transaction::Model {
        id: Uuid::new_v4().to_string(),
        user_id: scope.user_id.clone(),
        profile_id: scope.profile_id.clone(),
        budget_period_id: scope.period_id.clone(),
        budget_month: scope.month,
        budget_year: scope.year,
        transaction_type: input.transaction_type,
        category: input.category,
        amount: input.amount,
        description: input.description,
        notes: input.notes,
        transaction_date: input.transaction_date.unwrap_or_else(|| now.date_naive()),
        payment_method: input.payment_method,
        spent_for: input.spent_for,
        tag: input.tag,
        portfolio_id: input.portfolio_id,
        investment_category_id: input.investment_category_id,
        fund_id: input.fund_id,
        refund_for: None,
        original_transaction_id: None,
        status,
        is_deleted: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    let transaction = store.insert_transaction(scope, transaction).await?;
    info!(transaction_id = %transaction.id, amount = transaction.amount, "Added transaction");
    Ok(transaction)
}

/// Applies `patch` to a live transaction of the period and stamps `updated_at`.
pub async fn update_transaction(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    transaction_id: &str,
    patch: TransactionPatch,
) -> Result<transaction::Model> {
    let current = find_live(store, scope, transaction_id).await?;

    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
    }
    let status = match patch.status {
        None => current.status,
        Some(status) if status == current.status => status,
        Some(TransactionStatus::Cancelled) if current.status == TransactionStatus::Active => {
            TransactionStatus::Cancelled
        }
        Some(status) => {
            return Err(Error::validation(
                "status",
                format!(
                    "cannot move a {:?} transaction to {status:?}",
                    current.status
                ),
            ));
        }
    };

    let updated = transaction::Model {
        transaction_type: patch.transaction_type.unwrap_or(current.transaction_type),
        category: patch.category.unwrap_or(current.category),
        amount: patch.amount.unwrap_or(current.amount),
        description: patch.description.or(current.description),
        notes: patch.notes.or(current.notes),
        transaction_date: patch.transaction_date.unwrap_or(current.transaction_date),
        payment_method: patch.payment_method.or(current.payment_method),
        spent_for: patch.spent_for.or(current.spent_for),
        tag: patch.tag.or(current.tag),
        portfolio_id: patch.portfolio_id.or(current.portfolio_id),
        investment_category_id: patch
            .investment_category_id
            .or(current.investment_category_id),
        fund_id: patch.fund_id.or(current.fund_id),
        status,
        updated_at: Utc::now(),
        ..current
    };

    let updated = store.update_transaction(scope, updated).await?;
    info!(transaction_id, "Updated transaction");
    Ok(updated)
}

/// Soft-deletes a transaction: it stays in storage with `is_deleted = true`.
pub async fn delete_transaction(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    transaction_id: &str,
) -> Result<transaction::Model> {
    let current = find_live(store, scope, transaction_id).await?;
    let now = Utc::now();
    let deleted = store
        .update_transaction(
            scope,
            transaction::Model {
                is_deleted: true,
                deleted_at: Some(now),
                updated_at: now,
                ..current
            },
        )
        .await?;
    info!(transaction_id, "Soft-deleted transaction");
    Ok(deleted)
}

/// Refunds `amount` of an active transaction.
///
/// Records a `refund` transaction dated today, linked to the original through
/// `refund_for`, and moves the original to `refunded` when the full amount is returned
/// or to `partial_refund` otherwise. Returns the refund transaction.
///
/// # Errors
/// * `NotFound` if the original is not a live transaction of the period
/// * `Validation` if the amount is not positive, exceeds the original amount, or the
///   original is no longer active
#[instrument(skip(store, scope), fields(period_id = %scope.period_id))]
pub async fn refund_transaction(
    store: &dyn BudgetStore,
    scope: &PeriodScope,
    original_id: &str,
    amount: f64,
    reason: &str,
) -> Result<transaction::Model> {
    validate_amount(amount)?;
    let original = find_live(store, scope, original_id).await?;

    if original.status != TransactionStatus::Active {
        return Err(Error::validation(
            "status",
            format!("only active transactions can be refunded, this one is {:?}", original.status),
        ));
    }
    if amount > original.amount + AMOUNT_EPSILON {
        return Err(Error::validation(
            "amount",
            format!("refund of {amount} exceeds the original {}", original.amount),
        ));
    }

    let now = Utc::now();
    let refund = store
        .insert_transaction(
            scope,
            transaction::Model {
                id: Uuid::new_v4().to_string(),
                user_id: scope.user_id.clone(),
                profile_id: scope.profile_id.clone(),
                budget_period_id: scope.period_id.clone(),
                budget_month: scope.month,
                budget_year: scope.year,
                transaction_type: TransactionType::Refund,
                category: original.category.clone(),
                amount,
                description: Some(format!("Refund: {reason}")),
                notes: None,
                transaction_date: now.date_naive(),
                payment_method: None,
                spent_for: None,
                tag: None,
                portfolio_id: None,
                investment_category_id: None,
                fund_id: None,
                refund_for: Some(original.id.clone()),
                original_transaction_id: Some(original.id.clone()),
                status: TransactionStatus::Active,
                is_deleted: false,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
        )
        .await?;

    let status = if (amount - original.amount).abs() < AMOUNT_EPSILON {
        TransactionStatus::Refunded
    } else {
        TransactionStatus::PartialRefund
    };
    store
        .update_transaction(
            scope,
            transaction::Model {
                status,
                updated_at: now,
                ..original
            },
        )
        .await?;

    info!(refund_id = %refund.id, ?status, amount, "Refunded transaction");
    Ok(refund)
}

/// Removes every transaction of the period from storage, deleted or not.
pub async fn delete_all_transactions(store: &dyn BudgetStore, scope: &PeriodScope) -> Result<()> {
    store.delete_all_transactions(scope).await?;
    info!(period_id = %scope.period_id, "Deleted all transactions");
    Ok(())
}

//! Core business logic.
//!
//! Every operation is a free async function over `&dyn BudgetStore`, so the same code
//! runs on the relational and the flat backend. Nothing in here knows which one it got.

pub mod budget_config;
pub mod inheritance;
pub mod module;
pub mod period;
pub mod portfolio;
pub mod snapshot;
pub mod transaction;

/// Tolerance used when comparing money amounts.
pub const AMOUNT_EPSILON: f64 = 1e-9;

//! Configuration inheritance entity - Append-only audit of period-to-period copies.
//!
//! Records are written before any copying starts and are never updated or removed,
//! so a record may describe a copy that only partially succeeded.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A subtree that can be copied from one period to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritedComponent {
    /// Budget config with its allocations
    BudgetConfig,
    /// Portfolios with their categories and funds
    InvestmentPortfolios,
}

impl InheritedComponent {
    /// Wire name of the component.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BudgetConfig => "budget_config",
            Self::InvestmentPortfolios => "investment_portfolios",
        }
    }
}

impl fmt::Display for InheritedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InheritedComponent {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "budget_config" => Ok(Self::BudgetConfig),
            "investment_portfolios" => Ok(Self::InvestmentPortfolios),
            other => Err(crate::errors::Error::validation(
                "components",
                format!("unknown component `{other}`"),
            )),
        }
    }
}

/// Configuration inheritance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "configuration_inheritances")]
pub struct Model {
    /// Unique identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// User who requested the copy
    pub user_id: String,
    /// Profile owning the target period
    pub profile_id: String,
    /// Period copied from
    pub source_budget_period_id: String,
    /// Period copied into
    pub target_budget_period_id: String,
    /// Comma separated component names, see [`InheritedComponent`]
    pub inherited_components: String,
    /// When the copy was requested
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Parses the stored component list, skipping names this build does not know.
    #[must_use]
    pub fn components(&self) -> Vec<InheritedComponent> {
        self.inherited_components
            .split(',')
            .filter(|name| !name.trim().is_empty())
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

/// Audit records stand alone; the source period may not even exist.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

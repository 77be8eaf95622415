//! Default budget module catalog.
//!
//! The modules listed here are seeded as system modules for every new account. The list
//! can be overridden with `[[modules]]` tables in the configuration file.

use serde::Deserialize;

/// Configuration for a single seeded budget module
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Machine name of the module (e.g. `"need"`)
    pub name: String,
    /// Name shown in the interface
    pub display_name: String,
    /// Whether the module counts toward the budget total
    #[serde(default = "default_include_in_budget")]
    pub include_in_budget: bool,
}

const fn default_include_in_budget() -> bool {
    true
}

/// The built-in catalog: Need, Want, Savings, Investments.
#[must_use]
pub fn default_modules() -> Vec<ModuleConfig> {
    [
        ("need", "Need"),
        ("want", "Want"),
        ("savings", "Savings"),
        ("investments", "Investments"),
    ]
    .into_iter()
    .map(|(name, display_name)| ModuleConfig {
        name: name.to_string(),
        display_name: display_name.to_string(),
        include_in_budget: true,
    })
    .collect()
}

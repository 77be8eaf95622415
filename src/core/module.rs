//! Budget module catalog business logic.
//!
//! Modules are account-wide (not per profile or period). System modules are seeded at
//! sign-up and cannot be deactivated; user modules are appended after them.

use crate::{
    config::modules::ModuleConfig,
    entities::budget_module,
    errors::{Error, Result},
    store::BudgetStore,
};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Inserts the catalog as system modules, skipping names the user already has.
///
/// Sort orders follow the catalog order starting at 1. Calling it again is a no-op.
#[instrument(skip(store, catalog))]
pub async fn seed_system_modules(
    store: &dyn BudgetStore,
    user_id: &str,
    catalog: &[ModuleConfig],
) -> Result<Vec<budget_module::Model>> {
    let existing = store.list_modules(user_id).await?;
    let mut seeded = Vec::new();

    for (position, entry) in (1..).zip(catalog) {
        if existing.iter().any(|m| m.module_name == entry.name) {
            continue;
        }
        let module = budget_module::Model {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module_name: entry.name.clone(),
            display_name: entry.display_name.clone(),
            include_in_budget: entry.include_in_budget,
            is_system_module: true,
            is_active: true,
            sort_order: position,
            created_at: Utc::now(),
        };
        seeded.push(store.insert_module(module).await?);
    }

    info!(count = seeded.len(), "Seeded system budget modules");
    Ok(seeded)
}

/// Lists the active modules of a user by sort order.
pub async fn list_budget_modules(
    store: &dyn BudgetStore,
    user_id: &str,
) -> Result<Vec<budget_module::Model>> {
    let mut modules: Vec<budget_module::Model> = store
        .list_modules(user_id)
        .await?
        .into_iter()
        .filter(|m| m.is_active)
        .collect();
    modules.sort_by_key(|m| m.sort_order);
    Ok(modules)
}

/// Appends a user-defined module after every existing one.
///
/// # Errors
/// * `Validation` for an empty name or a name an active module already uses
#[instrument(skip(store))]
pub async fn create_budget_module(
    store: &dyn BudgetStore,
    user_id: &str,
    module_name: &str,
    display_name: &str,
    include_in_budget: bool,
) -> Result<budget_module::Model> {
    let module_name = module_name.trim();
    if module_name.is_empty() {
        return Err(Error::validation("module_name", "must not be empty"));
    }

    let existing = store.list_modules(user_id).await?;
    if existing
        .iter()
        .any(|m| m.is_active && m.module_name == module_name)
    {
        return Err(Error::validation(
            "module_name",
            format!("a module named {module_name} already exists"),
        ));
    }

    let sort_order = existing.iter().map(|m| m.sort_order).max().unwrap_or(0) + 1;
    let display_name = if display_name.trim().is_empty() {
        module_name
    } else {
        display_name.trim()
    };

    let module = store
        .insert_module(budget_module::Model {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module_name: module_name.to_string(),
            display_name: display_name.to_string(),
            include_in_budget,
            is_system_module: false,
            is_active: true,
            sort_order,
            created_at: Utc::now(),
        })
        .await?;
    info!(module_id = %module.id, sort_order, "Created budget module");
    Ok(module)
}

/// Soft-deletes a user module.
///
/// # Errors
/// * `NotFound` if the module is not the user's
/// * `Validation` for system modules
#[instrument(skip(store))]
pub async fn deactivate_budget_module(
    store: &dyn BudgetStore,
    user_id: &str,
    module_id: &str,
) -> Result<budget_module::Model> {
    let module = store
        .list_modules(user_id)
        .await?
        .into_iter()
        .find(|m| m.id == module_id)
        .ok_or_else(|| Error::not_found("budget_module", module_id))?;

    if module.is_system_module {
        return Err(Error::validation(
            "module_id",
            format!("system module {} cannot be removed", module.module_name),
        ));
    }

    let module = store
        .update_module(budget_module::Model {
            is_active: false,
            ..module
        })
        .await?;
    info!("Deactivated budget module");
    Ok(module)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{config::modules::default_modules, test_utils::*};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        for (backend, store) in all_backends().await {
            let (user, _) = seed_user(store.as_ref()).await;
            let catalog = default_modules();

            let first = seed_system_modules(store.as_ref(), &user.id, &catalog)
                .await
                .unwrap();
            let second = seed_system_modules(store.as_ref(), &user.id, &catalog)
                .await
                .unwrap();

            assert_eq!(first.len(), 4, "{backend}");
            assert!(second.is_empty(), "{backend}");
            let listed = list_budget_modules(store.as_ref(), &user.id).await.unwrap();
            let names: Vec<&str> = listed.iter().map(|m| m.module_name.as_str()).collect();
            assert_eq!(names, ["need", "want", "savings", "investments"], "{backend}");
            assert!(listed.iter().all(|m| m.is_system_module), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_create_appends_after_existing() {
        for (backend, store) in all_backends().await {
            let (user, _) = seed_user(store.as_ref()).await;
            seed_system_modules(store.as_ref(), &user.id, &default_modules())
                .await
                .unwrap();

            let travel = create_budget_module(store.as_ref(), &user.id, "travel", "Travel", true)
                .await
                .unwrap();

            assert_eq!(travel.sort_order, 5, "{backend}");
            assert!(!travel.is_system_module, "{backend}");

            let err = create_budget_module(store.as_ref(), &user.id, "travel", "", true)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation { field: "module_name", .. }), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_system_modules_cannot_be_deactivated() {
        for (backend, store) in all_backends().await {
            let (user, _) = seed_user(store.as_ref()).await;
            let seeded = seed_system_modules(store.as_ref(), &user.id, &default_modules())
                .await
                .unwrap();

            let err = deactivate_budget_module(store.as_ref(), &user.id, &seeded[0].id)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation { .. }), "{backend}");

            let custom = create_budget_module(store.as_ref(), &user.id, "pets", "Pets", false)
                .await
                .unwrap();
            let removed = deactivate_budget_module(store.as_ref(), &user.id, &custom.id)
                .await
                .unwrap();
            assert!(!removed.is_active, "{backend}");

            let listed = list_budget_modules(store.as_ref(), &user.id).await.unwrap();
            assert!(listed.iter().all(|m| m.id != custom.id), "{backend}");
        }
    }
}

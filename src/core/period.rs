//! Period resolution.
//!
//! A budget period is the (user, profile, month, year) container everything else hangs
//! off. Periods are created lazily the first time they are asked for and never deleted.

use crate::{
    entities::{budget_period, profile},
    errors::{Error, Result},
    store::{BudgetStore, PeriodScope},
};
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Earliest accepted budget year
pub const MIN_BUDGET_YEAR: i32 = 2020;
/// Latest accepted budget year
pub const MAX_BUDGET_YEAR: i32 = 3000;

/// Checks that `month` is 1-12 and `year` lies in the supported range.
pub fn validate_budget_month(month: i32, year: i32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(Error::validation(
            "month",
            format!("must be between 1 and 12, got {month}"),
        ));
    }
    if !(MIN_BUDGET_YEAR..=MAX_BUDGET_YEAR).contains(&year) {
        return Err(Error::validation(
            "year",
            format!("must be between {MIN_BUDGET_YEAR} and {MAX_BUDGET_YEAR}, got {year}"),
        ));
    }
    Ok(())
}

/// Looks up a profile of the user; `NotFound` if it does not exist.
pub async fn find_profile(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
) -> Result<profile::Model> {
    store
        .find_profile(user_id, profile_id)
        .await?
        .ok_or_else(|| Error::not_found("profile", profile_id))
}

/// Returns the period of `profile` for (month, year), creating it if absent.
///
/// Repeated calls return the same period. If the insert loses against a concurrent
/// creator, the winner's period is returned.
pub async fn get_or_create_period(
    store: &dyn BudgetStore,
    profile: &profile::Model,
    month: i32,
    year: i32,
) -> Result<budget_period::Model> {
    validate_budget_month(month, year)?;

    if let Some(period) = store.find_period(profile, month, year).await? {
        return Ok(period);
    }

    let period = budget_period::Model {
        id: Uuid::new_v4().to_string(),
        user_id: profile.user_id.clone(),
        profile_id: profile.id.clone(),
        budget_month: month,
        budget_year: year,
        is_active: true,
        created_at: Utc::now(),
    };

    match store.insert_period(profile, period).await {
        Ok(period) => {
            info!(
                period_id = %period.id,
                profile_id = %profile.id,
                month,
                year,
                "Created budget period"
            );
            Ok(period)
        }
        Err(err) => store.find_period(profile, month, year).await?.ok_or(err),
    }
}

/// Resolves the period for (user, profile, month, year).
///
/// # Errors
/// * `NotFound` if the profile does not belong to the user
/// * `Validation` for a month or year out of range
/// * `Store` if the lookup or the insert fails
#[instrument(skip(store))]
pub async fn resolve_period(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
    month: i32,
    year: i32,
) -> Result<budget_period::Model> {
    let profile = find_profile(store, user_id, profile_id).await?;
    get_or_create_period(store, &profile, month, year).await
}

/// Resolves the full [`PeriodScope`] the mutations run in.
pub async fn resolve_scope(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
    month: i32,
    year: i32,
) -> Result<PeriodScope> {
    let profile = find_profile(store, user_id, profile_id).await?;
    let period = get_or_create_period(store, &profile, month, year).await?;
    Ok(PeriodScope::new(&profile, &period))
}

/// Builds the scope of an existing period of the user, by period id.
pub async fn scope_for_period_id(
    store: &dyn BudgetStore,
    user_id: &str,
    period_id: &str,
) -> Result<PeriodScope> {
    let period = store
        .find_period_by_id(user_id, period_id)
        .await?
        .ok_or_else(|| Error::not_found("budget_period", period_id))?;
    let profile = find_profile(store, user_id, &period.profile_id).await?;
    Ok(PeriodScope::new(&profile, &period))
}

/// Lists the periods of a profile, newest first.
pub async fn list_periods(
    store: &dyn BudgetStore,
    user_id: &str,
    profile_id: &str,
) -> Result<Vec<budget_period::Model>> {
    let profile = find_profile(store, user_id, profile_id).await?;
    let mut periods = store.list_periods(&profile).await?;
    periods.sort_by(|a, b| {
        (b.budget_year, b.budget_month).cmp(&(a.budget_year, a.budget_month))
    });
    Ok(periods)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        store::{FileEngine, FlatStore},
        test_utils::*,
    };
    use std::sync::Arc;

    #[test]
    fn test_validate_budget_month_bounds() {
        assert!(validate_budget_month(1, 2020).is_ok());
        assert!(validate_budget_month(12, 3000).is_ok());

        let cases = [
            (0, 2024, "month"),
            (13, 2024, "month"),
            (6, 2019, "year"),
            (6, 3001, "year"),
        ];
        for (month, year, field) in cases {
            let err = validate_budget_month(month, year).unwrap_err();
            assert!(
                matches!(err, Error::Validation { field: f, .. } if f == field),
                "({month}, {year}) should fail on {field}"
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_period_is_idempotent() {
        for (backend, store) in all_backends().await {
            let (user, profile) = seed_user(store.as_ref()).await;

            let first = resolve_period(store.as_ref(), &user.id, &profile.id, 3, 2024)
                .await
                .unwrap();
            let second = resolve_period(store.as_ref(), &user.id, &profile.id, 3, 2024)
                .await
                .unwrap();

            assert_eq!(first.id, second.id, "{backend}");
            assert!(first.is_active, "{backend}");
            assert_eq!(store.list_periods(&profile).await.unwrap().len(), 1, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_period() {
        let dir = tempfile::tempdir().unwrap();
        let mut backends = all_backends().await;
        let file_store = FlatStore::new(FileEngine::open(dir.path()).await.unwrap(), "lb");
        backends.push(("flat-file", Arc::new(file_store)));

        for (backend, store) in backends {
            let (user, profile) = seed_user(store.as_ref()).await;
            for month in 1..=12 {
                let (a, b) = tokio::join!(
                    resolve_period(store.as_ref(), &user.id, &profile.id, month, 2024),
                    resolve_period(store.as_ref(), &user.id, &profile.id, month, 2024),
                );
                let (a, b) = (a.unwrap(), b.unwrap());
                assert_eq!(a.id, b.id, "{backend}: month {month}");

                let scope = scope_for_period_id(store.as_ref(), &user.id, &a.id)
                    .await
                    .unwrap();
                assert_eq!(scope.period_id, a.id, "{backend}: month {month}");
            }
            assert_eq!(store.list_periods(&profile).await.unwrap().len(), 12, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_resolve_period_separates_keys() {
        for (backend, store) in all_backends().await {
            let (user, profile) = seed_user(store.as_ref()).await;

            let march = resolve_period(store.as_ref(), &user.id, &profile.id, 3, 2024)
                .await
                .unwrap();
            let april = resolve_period(store.as_ref(), &user.id, &profile.id, 4, 2024)
                .await
                .unwrap();

            assert_ne!(march.id, april.id, "{backend}");
            assert_eq!((april.budget_month, april.budget_year), (4, 2024), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_resolve_period_unknown_profile() {
        for (backend, store) in all_backends().await {
            let (user, _) = seed_user(store.as_ref()).await;

            let err = resolve_period(store.as_ref(), &user.id, "missing", 3, 2024)
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::NotFound { entity: "profile", .. }),
                "{backend}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_list_periods_newest_first() {
        for (backend, store) in all_backends().await {
            let (user, profile) = seed_user(store.as_ref()).await;
            for (month, year) in [(11, 2023), (2, 2024), (12, 2023)] {
                resolve_period(store.as_ref(), &user.id, &profile.id, month, year)
                    .await
                    .unwrap();
            }

            let keys: Vec<(i32, i32)> = list_periods(store.as_ref(), &user.id, &profile.id)
                .await
                .unwrap()
                .into_iter()
                .map(|p| (p.budget_month, p.budget_year))
                .collect();
            assert_eq!(keys, [(2, 2024), (12, 2023), (11, 2023)], "{backend}");
        }
    }

    #[tokio::test]
    async fn test_scope_for_period_id() {
        for (backend, store) in all_backends().await {
            let scope = seed_scope(store.as_ref()).await;

            let resolved = scope_for_period_id(store.as_ref(), &scope.user_id, &scope.period_id)
                .await
                .unwrap();
            assert_eq!(resolved, scope, "{backend}");

            let err = scope_for_period_id(store.as_ref(), &scope.user_id, "nope")
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::NotFound { entity: "budget_period", .. }),
                "{backend}"
            );
        }
    }
}

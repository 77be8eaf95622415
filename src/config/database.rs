//! Database configuration module.
//!
//! This module handles the relational store's connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Two extra unique indexes make period
//! resolution idempotent: one period per (user, profile, month, year) and, through the
//! entity's column attribute, one budget config per period.

use crate::entities::{
    BudgetAllocation, BudgetConfig, BudgetModule, BudgetPeriod, ConfigurationInheritance,
    Credential, InvestmentCategory, InvestmentFund, InvestmentPortfolio, Profile, Transaction,
    User, budget_period,
};
use crate::errors::{Result, StoreResultExt};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use tracing::{debug, info};

/// Default `SQLite` location used when no `DATABASE_URL` is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget.sqlite?mode=rwc";

/// Establishes a connection to the given database URL.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    Database::connect(database_url).await.store_op("connect")
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement))
        .await
        .store_op("create_table")?;
    Ok(())
}

/// Creates all tables and indexes, skipping the ones that already exist.
///
/// Parents are created before children so foreign keys always point at existing tables.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Credential).await?;
    create_table(db, &schema, Profile).await?;
    create_table(db, &schema, BudgetPeriod).await?;
    create_table(db, &schema, BudgetModule).await?;
    create_table(db, &schema, BudgetConfig).await?;
    create_table(db, &schema, BudgetAllocation).await?;
    create_table(db, &schema, InvestmentPortfolio).await?;
    create_table(db, &schema, InvestmentCategory).await?;
    create_table(db, &schema, InvestmentFund).await?;
    create_table(db, &schema, Transaction).await?;
    create_table(db, &schema, ConfigurationInheritance).await?;

    let period_key = Index::create()
        .name("idx_budget_periods_key")
        .table(BudgetPeriod)
        .col(budget_period::Column::UserId)
        .col(budget_period::Column::ProfileId)
        .col(budget_period::Column::BudgetMonth)
        .col(budget_period::Column::BudgetYear)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&period_key))
        .await
        .store_op("create_index")?;

    info!("Relational schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{budget_period::Model as BudgetPeriodModel, user::Model as UserModel};
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<BudgetPeriodModel> = BudgetPeriod::find().limit(1).all(&db).await?;
        let _ = Transaction::find().limit(1).all(&db).await?;
        let _ = ConfigurationInheritance::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_period_key_is_unique() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let now = chrono::Utc::now();
        crate::entities::user::ActiveModel {
            id: Set("u1".to_string()),
            email: Set("a@b.c".to_string()),
            full_name: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&db)
        .await?;
        crate::entities::profile::ActiveModel {
            id: Set("p1".to_string()),
            user_id: Set("u1".to_string()),
            profile_name: Set("Primary".to_string()),
            display_name: Set(None),
            is_primary: Set(true),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&db)
        .await?;

        let period = |id: &str| budget_period::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set("u1".to_string()),
            profile_id: Set("p1".to_string()),
            budget_month: Set(3),
            budget_year: Set(2024),
            is_active: Set(true),
            created_at: Set(now),
        };
        period("first").insert(&db).await?;
        assert!(period("second").insert(&db).await.is_err());
        Ok(())
    }
}

// SPDX-License-Identifier: MIT

use anyhow::Result;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePool},
    Sqlite,
};
use std::str::FromStr;

pub async fn create_db_pool(db_url: &str) -> Result<SqlitePool> {
    // Create database if it doesn't exist
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        Sqlite::create_database(db_url).await?;
    }

    // Foreign keys must be on for user deletion to cascade into
    // transactions and currency_usage.
    let options = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;

    // Run migrations
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_db_pool("sqlite::memory:").await
}

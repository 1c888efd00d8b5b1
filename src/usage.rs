// SPDX-License-Identifier: MIT

use anyhow::Result;
use sqlx::sqlite::SqlitePool;

use crate::models::CurrencyUsageRecord;

/// Insert-or-increment the usage counter for a (user, currency) pair.
/// A single upsert so concurrent increments never lose updates.
///
/// Currency codes are case-sensitive keys: "eur" and "EUR" are distinct
/// counters.
pub async fn increment_usage(
    pool: &SqlitePool,
    user_id: i64,
    currency: &str,
    now_ms: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO currency_usage (user_id, currency, usage_count, last_used)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(user_id, currency) DO UPDATE SET
            usage_count = usage_count + 1,
            last_used = excluded.last_used,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(user_id)
    .bind(currency)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// All usage records for a user, most used first; ties on usage_count are
/// broken by recency (most recent last_used wins). This ordering is a hard
/// contract relied on by the ranking service.
pub async fn get_usage_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<CurrencyUsageRecord>> {
    let records = sqlx::query_as::<_, CurrencyUsageRecord>(
        r#"
        SELECT user_id, currency, usage_count, last_used
        FROM currency_usage
        WHERE user_id = ?
        ORDER BY usage_count DESC, last_used DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Same ordering as [`get_usage_for_user`], truncated.
pub async fn get_top_for_user(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<CurrencyUsageRecord>> {
    let records = sqlx::query_as::<_, CurrencyUsageRecord>(
        r#"
        SELECT user_id, currency, usage_count, last_used
        FROM currency_usage
        WHERE user_id = ?
        ORDER BY usage_count DESC, last_used DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Remove every usage record for one user, leaving other users untouched.
pub async fn delete_all_for_user(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM currency_usage WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Number of distinct currencies this user has used.
pub async fn count_currencies_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM currency_usage WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

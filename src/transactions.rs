// SPDX-License-Identifier: MIT

use anyhow::Result;
use sqlx::sqlite::SqlitePool;

use crate::models::Transaction;

pub async fn create_user(pool: &SqlitePool, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO users (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_user_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(id,)| id))
}

pub async fn get_or_create_user(pool: &SqlitePool, name: &str) -> Result<i64> {
    if let Some(id) = get_user_id(pool, name).await? {
        return Ok(id);
    }
    create_user(pool, name).await
}

/// Delete a user. Foreign keys cascade, so the user's transactions and
/// currency usage rows go with them.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn add_transaction(
    pool: &SqlitePool,
    user_id: i64,
    amount: f64,
    currency: &str,
    description: &str,
    category: Option<&str>,
    occurred_at: i64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, amount, currency, description, category, occurred_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(currency)
    .bind(description)
    .bind(category)
    .bind(occurred_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_transaction(pool: &SqlitePool, id: i64) -> Result<Option<Transaction>> {
    let record = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT id, user_id, amount, currency, description, category, occurred_at
        FROM transactions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// A user's transactions, most recent first.
pub async fn list_transactions(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Transaction>> {
    let records = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT id, user_id, amount, currency, description, category, occurred_at
        FROM transactions
        WHERE user_id = ?
        ORDER BY occurred_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Update a transaction in place. `None` fields keep their current value.
pub async fn update_transaction(
    pool: &SqlitePool,
    id: i64,
    amount: Option<f64>,
    currency: Option<&str>,
    description: Option<&str>,
    category: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET
            amount = COALESCE(?, amount),
            currency = COALESCE(?, currency),
            description = COALESCE(?, description),
            category = COALESCE(?, category),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(amount)
    .bind(currency)
    .bind(description)
    .bind(category)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_transaction(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Per-currency sums for a user, largest total first.
pub async fn totals_by_currency(pool: &SqlitePool, user_id: i64) -> Result<Vec<(String, f64)>> {
    let rows = sqlx::query_as::<_, (String, f64)>(
        r#"
        SELECT currency, SUM(amount)
        FROM transactions
        WHERE user_id = ?
        GROUP BY currency
        ORDER BY SUM(amount) DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::usage;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_transaction_crud() -> Result<()> {
        let pool = create_test_pool().await?;
        let user = create_user(&pool, "alice").await?;

        let id = add_transaction(&pool, user, 12.5, "EUR", "lunch", Some("food"), 1_000).await?;

        let tx = get_transaction(&pool, id).await?.unwrap();
        assert_eq!(tx.user_id, user);
        assert_relative_eq!(tx.amount, 12.5, epsilon = 1e-9);
        assert_eq!(tx.currency, "EUR");
        assert_eq!(tx.description, "lunch");
        assert_eq!(tx.category.as_deref(), Some("food"));
        assert_eq!(tx.occurred_at, 1_000);

        assert!(update_transaction(&pool, id, Some(15.0), None, Some("dinner"), None).await?);
        let updated = get_transaction(&pool, id).await?.unwrap();
        assert_relative_eq!(updated.amount, 15.0, epsilon = 1e-9);
        assert_eq!(updated.currency, "EUR");
        assert_eq!(updated.description, "dinner");

        assert!(delete_transaction(&pool, id).await?);
        assert!(get_transaction(&pool, id).await?.is_none());
        assert!(!delete_transaction(&pool, id).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_most_recent_first() -> Result<()> {
        let pool = create_test_pool().await?;
        let user = create_user(&pool, "alice").await?;

        add_transaction(&pool, user, 1.0, "USD", "first", None, 1_000).await?;
        add_transaction(&pool, user, 2.0, "USD", "third", None, 3_000).await?;
        add_transaction(&pool, user, 3.0, "USD", "second", None, 2_000).await?;

        let txs = list_transactions(&pool, user, 10).await?;
        let names: Vec<&str> = txs.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(names, vec!["third", "second", "first"]);

        let limited = list_transactions(&pool, user, 2).await?;
        assert_eq!(limited.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_totals_by_currency() -> Result<()> {
        let pool = create_test_pool().await?;
        let user = create_user(&pool, "alice").await?;

        add_transaction(&pool, user, 10.0, "USD", "", None, 1_000).await?;
        add_transaction(&pool, user, 5.0, "USD", "", None, 2_000).await?;
        add_transaction(&pool, user, 7.0, "JPY", "", None, 3_000).await?;

        let totals = totals_by_currency(&pool, user).await?;
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].0, "USD");
        assert_relative_eq!(totals[0].1, 15.0, epsilon = 1e-9);
        assert_eq!(totals[1].0, "JPY");

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_cascades() -> Result<()> {
        let pool = create_test_pool().await?;
        let alice = create_user(&pool, "alice").await?;
        let bob = create_user(&pool, "bob").await?;

        add_transaction(&pool, alice, 10.0, "USD", "", None, 1_000).await?;
        add_transaction(&pool, bob, 20.0, "EUR", "", None, 2_000).await?;
        usage::increment_usage(&pool, alice, "USD", 1_000).await?;
        usage::increment_usage(&pool, bob, "EUR", 2_000).await?;

        delete_user(&pool, alice).await?;

        assert!(list_transactions(&pool, alice, 10).await?.is_empty());
        assert!(usage::get_usage_for_user(&pool, alice).await?.is_empty());

        // Bob is untouched
        assert_eq!(list_transactions(&pool, bob, 10).await?.len(), 1);
        assert_eq!(usage::get_usage_for_user(&pool, bob).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_or_create_user_idempotent() -> Result<()> {
        let pool = create_test_pool().await?;

        let first = get_or_create_user(&pool, "alice").await?;
        let second = get_or_create_user(&pool, "alice").await?;
        assert_eq!(first, second);

        let other = get_or_create_user(&pool, "bob").await?;
        assert_ne!(first, other);

        Ok(())
    }
}

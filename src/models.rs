// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized form of one persisted exchange-rate entry. Stored as JSON in
/// the `rate_cache` key-value table under `exchange_rate_{FROM}_{TO}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExchangeRate {
    pub base_code: String,
    pub target_code: String,
    pub conversion_rate: f64,
    /// Epoch millis of the fetch that produced this rate.
    pub last_update_time: i64,
}

impl CachedExchangeRate {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_update_time
    }
}

/// One row of the per-user currency usage table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CurrencyUsageRecord {
    pub user_id: i64,
    pub currency: String,
    pub usage_count: i64,
    /// Epoch millis of the most recent increment.
    pub last_used: i64,
}

/// A recorded expense or income line.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub category: Option<String>,
    /// Epoch millis of when the transaction took place.
    pub occurred_at: i64,
}

/// Pair-conversion response from the remote exchange-rate API.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PairQuote {
    pub result: String,
    pub base_code: String,
    pub target_code: String,
    pub conversion_rate: f64,
    pub time_last_update_utc: Option<String>,
    pub time_next_update_utc: Option<String>,
    // Catch-all for fields we don't care about
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, Value>,
}

// SPDX-License-Identifier: MIT

use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::RateProvider;
use crate::clock::TimeSource;
use crate::models::CachedExchangeRate;

pub const DEFAULT_RATE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

const RATE_KEY_PREFIX: &str = "exchange_rate_";

/// Outcome of a conversion. Degraded-mode fallback is a first-class branch:
/// a stale rate beats no rate, and `Unavailable` replaces exceptions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Converted with a rate younger than the TTL (or the identity path).
    Fresh(f64),
    /// Remote fetch failed; converted with an expired cached rate.
    Stale(f64),
    /// No cached rate and the remote fetch failed.
    Unavailable,
}

impl Conversion {
    pub fn value(&self) -> Option<f64> {
        match self {
            Conversion::Fresh(v) | Conversion::Stale(v) => Some(*v),
            Conversion::Unavailable => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Conversion::Stale(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCacheStats {
    pub total_cached: usize,
    pub valid_cached: usize,
    pub expired_cached: usize,
    /// Entries whose payload no longer parses. Counted in total but in
    /// neither valid nor expired.
    pub corrupted_cached: usize,
}

/// Persisted, expiring cache in front of the remote pair-rate API.
///
/// Entries live in the `rate_cache` key-value table under
/// `exchange_rate_{FROM}_{TO}` and expire after `ttl_ms` (24h by default).
/// Network and parse failures never escape `convert`; they collapse into
/// the stale-fallback or `Unavailable` outcomes. Only local storage errors
/// propagate.
pub struct ExchangeRateCache {
    pool: SqlitePool,
    provider: Arc<dyn RateProvider>,
    clock: Arc<dyn TimeSource>,
    ttl_ms: i64,
}

impl ExchangeRateCache {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn RateProvider>,
        clock: Arc<dyn TimeSource>,
        ttl_ms: i64,
    ) -> Self {
        Self {
            pool,
            provider,
            clock,
            ttl_ms,
        }
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion> {
        // Same-currency fast path, case-insensitive, zero I/O
        if from.eq_ignore_ascii_case(to) {
            return Ok(Conversion::Fresh(amount));
        }

        let key = cache_key(from, to);
        let now = self.clock.now_ms();
        let cached = self.load_entry(&key).await?;

        if let Some(entry) = &cached {
            if entry.age_ms(now) <= self.ttl_ms {
                debug!(key = %key, "rate cache hit");
                return Ok(Conversion::Fresh(amount * entry.conversion_rate));
            }
            debug!(key = %key, "rate cache entry expired");
        }

        match self.fetch_and_store(from, to, &key).await {
            Ok(rate) => Ok(Conversion::Fresh(amount * rate)),
            Err(err) => match cached {
                Some(entry) => {
                    warn!(key = %key, error = %err, "remote fetch failed, serving stale rate");
                    Ok(Conversion::Stale(amount * entry.conversion_rate))
                }
                None => {
                    warn!(key = %key, error = %err, "remote fetch failed, no fallback");
                    Ok(Conversion::Unavailable)
                }
            },
        }
    }

    /// True unless there is neither a usable cache entry nor a reachable
    /// remote rate for the pair. A successful probe persists the rate.
    pub async fn is_conversion_available(&self, from: &str, to: &str) -> Result<bool> {
        Ok(self.convert(1.0, from, to).await?.value().is_some())
    }

    /// Remove every persisted rate entry. Unrelated keys in the table are
    /// left alone.
    pub async fn clear_cache(&self) -> Result<()> {
        sqlx::query("DELETE FROM rate_cache WHERE cache_key LIKE ?")
            .bind(format!("{}%", RATE_KEY_PREFIX))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Classify every persisted rate entry by the TTL rule. Corrupted
    /// payloads are reported separately rather than silently dropped from
    /// the valid/expired tallies.
    pub async fn cache_stats(&self) -> Result<RateCacheStats> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT payload FROM rate_cache WHERE cache_key LIKE ?")
                .bind(format!("{}%", RATE_KEY_PREFIX))
                .fetch_all(&self.pool)
                .await?;

        let now = self.clock.now_ms();
        let mut stats = RateCacheStats {
            total_cached: rows.len(),
            valid_cached: 0,
            expired_cached: 0,
            corrupted_cached: 0,
        };

        for (payload,) in rows {
            match serde_json::from_str::<CachedExchangeRate>(&payload) {
                Ok(entry) if entry.age_ms(now) <= self.ttl_ms => stats.valid_cached += 1,
                Ok(_) => stats.expired_cached += 1,
                Err(_) => stats.corrupted_cached += 1,
            }
        }

        Ok(stats)
    }

    async fn load_entry(&self, key: &str) -> Result<Option<CachedExchangeRate>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM rate_cache WHERE cache_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((payload,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<CachedExchangeRate>(&payload) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                // Corrupted payload is a cache miss, not an error
                warn!(key = %key, error = %err, "corrupted rate cache entry, treating as miss");
                Ok(None)
            }
        }
    }

    async fn fetch_and_store(&self, from: &str, to: &str, key: &str) -> Result<f64> {
        let quote = self.provider.fetch_rate(from, to).await?;

        let entry = CachedExchangeRate {
            base_code: quote.base_code,
            target_code: quote.target_code,
            conversion_rate: quote.conversion_rate,
            last_update_time: self.clock.now_ms(),
        };

        sqlx::query(
            r#"
            INSERT INTO rate_cache (cache_key, payload)
            VALUES (?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(&entry)?)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, rate = entry.conversion_rate, "stored fresh rate");
        Ok(entry.conversion_rate)
    }
}

fn cache_key(from: &str, to: &str) -> String {
    format!(
        "{}{}_{}",
        RATE_KEY_PREFIX,
        from.to_uppercase(),
        to.to_uppercase()
    )
}

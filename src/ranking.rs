// SPDX-License-Identifier: MIT

use anyhow::Result;
use futures::stream::{self, Stream};
use sqlx::sqlite::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::clock::TimeSource;
use crate::currencies::{find_currency, Currency, CURRENCIES};
use crate::models::CurrencyUsageRecord;
use crate::usage;

pub const DEFAULT_RANKING_CACHE_EXPIRATION_MS: i64 = 5 * 60 * 1000;

/// In-memory result cache for per-user currency rankings. Owned by the
/// service and injected at construction so tests control its lifetime and
/// expiration window. An entry is only valid while its timestamp is within
/// `expiration_ms` of now.
pub struct RankingCache {
    sorted: HashMap<i64, Vec<Currency>>,
    usage: HashMap<i64, Vec<CurrencyUsageRecord>>,
    timestamps: HashMap<i64, i64>,
    expiration_ms: i64,
}

impl RankingCache {
    pub fn new(expiration_ms: i64) -> Self {
        Self {
            sorted: HashMap::new(),
            usage: HashMap::new(),
            timestamps: HashMap::new(),
            expiration_ms,
        }
    }

    fn get_fresh(&self, user_id: i64, now_ms: i64) -> Option<&Vec<Currency>> {
        let written = self.timestamps.get(&user_id)?;
        if now_ms - written > self.expiration_ms {
            return None;
        }
        self.sorted.get(&user_id)
    }

    fn put(
        &mut self,
        user_id: i64,
        sorted: Vec<Currency>,
        records: Vec<CurrencyUsageRecord>,
        now_ms: i64,
    ) {
        self.sorted.insert(user_id, sorted);
        self.usage.insert(user_id, records);
        self.timestamps.insert(user_id, now_ms);
    }

    fn invalidate(&mut self, user_id: i64) {
        self.sorted.remove(&user_id);
        self.usage.remove(&user_id);
        self.timestamps.remove(&user_id);
    }

    fn invalidate_all(&mut self) {
        self.sorted.clear();
        self.usage.clear();
        self.timestamps.clear();
    }

    fn stats(&self) -> RankingCacheStats {
        RankingCacheStats {
            sorted_currencies_cache_size: self.sorted.len(),
            currency_usage_cache_size: self.usage.len(),
            cache_timestamps_size: self.timestamps.len(),
            cache_expiration_time_ms: self.expiration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingCacheStats {
    pub sorted_currencies_cache_size: usize,
    pub currency_usage_cache_size: usize,
    pub cache_timestamps_size: usize,
    pub cache_expiration_time_ms: i64,
}

/// Orders the currency picker for a user: currencies they actually use
/// first (by usage count, ties to the most recently used), everything else
/// after by global popularity.
pub struct CurrencyRankingService {
    pool: SqlitePool,
    cache: Mutex<RankingCache>,
    clock: Arc<dyn TimeSource>,
}

impl CurrencyRankingService {
    pub fn new(pool: SqlitePool, cache: RankingCache, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            pool,
            cache: Mutex::new(cache),
            clock,
        }
    }

    pub async fn get_sorted_currencies(&self, user_id: i64) -> Result<Vec<Currency>> {
        let now = self.clock.now_ms();

        {
            let cache = self.cache.lock().unwrap();
            if let Some(sorted) = cache.get_fresh(user_id, now) {
                debug!(user_id, "ranking cache hit");
                return Ok(sorted.clone());
            }
        }

        let records = usage::get_usage_for_user(&self.pool, user_id).await?;
        let sorted = rank_currencies(&records);

        debug!(user_id, used = records.len(), "ranking computed");
        let mut cache = self.cache.lock().unwrap();
        cache.put(user_id, sorted.clone(), records, now);

        Ok(sorted)
    }

    pub async fn get_top_currencies(&self, user_id: i64, limit: usize) -> Result<Vec<Currency>> {
        let mut sorted = self.get_sorted_currencies(user_id).await?;
        sorted.truncate(limit);
        Ok(sorted)
    }

    /// One-shot stream form of [`get_top_currencies`]: the ordered sequence
    /// observed once, not a live view.
    pub async fn top_currencies_stream(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<impl Stream<Item = Currency>> {
        let top = self.get_top_currencies(user_id, limit).await?;
        Ok(stream::iter(top))
    }

    /// Only the currencies the user has usage records for, in ranking order.
    pub async fn get_used_currencies(&self, user_id: i64) -> Result<Vec<Currency>> {
        // Warms the cache as a side effect
        self.get_sorted_currencies(user_id).await?;

        let cache = self.cache.lock().unwrap();
        let records = cache.usage.get(&user_id).cloned().unwrap_or_default();
        drop(cache);

        Ok(records
            .iter()
            .filter_map(|r| find_currency(&r.currency))
            .copied()
            .collect())
    }

    /// Record one use of a currency and drop the user's cached ranking so
    /// the next read reflects the write.
    pub async fn track_currency_usage(&self, user_id: i64, currency: &str) -> Result<()> {
        usage::increment_usage(&self.pool, user_id, currency, self.clock.now_ms()).await?;
        self.invalidate_cache(user_id);
        Ok(())
    }

    pub fn invalidate_cache(&self, user_id: i64) {
        self.cache.lock().unwrap().invalidate(user_id);
    }

    pub fn invalidate_all_cache(&self) {
        self.cache.lock().unwrap().invalidate_all();
    }

    pub fn cache_stats(&self) -> RankingCacheStats {
        self.cache.lock().unwrap().stats()
    }
}

/// Used currencies in usage order, then unused currencies by popularity.
/// Usage records whose code is not in the static table are skipped.
fn rank_currencies(records: &[CurrencyUsageRecord]) -> Vec<Currency> {
    let mut used: Vec<Currency> = Vec::new();
    let mut used_codes: HashSet<&str> = HashSet::new();

    for record in records {
        if let Some(currency) = find_currency(&record.currency) {
            used.push(*currency);
            used_codes.insert(currency.code);
        }
    }

    let mut unused: Vec<Currency> = CURRENCIES
        .iter()
        .filter(|c| !used_codes.contains(c.code))
        .copied()
        .collect();
    unused.sort_by_key(|c| c.popularity);

    used.extend(unused);
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedTimeSource;
    use crate::db::create_test_pool;
    use crate::transactions::create_user;
    use futures::StreamExt;

    async fn make_service() -> Result<(CurrencyRankingService, Arc<FixedTimeSource>, i64)> {
        let pool = create_test_pool().await?;
        let user = create_user(&pool, "alice").await?;
        let clock = Arc::new(FixedTimeSource::new(1_000_000));
        let service = CurrencyRankingService::new(
            pool,
            RankingCache::new(DEFAULT_RANKING_CACHE_EXPIRATION_MS),
            clock.clone(),
        );
        Ok((service, clock, user))
    }

    #[tokio::test]
    async fn test_no_usage_orders_by_popularity() -> Result<()> {
        let (service, _, user) = make_service().await?;

        let sorted = service.get_sorted_currencies(user).await?;
        assert_eq!(sorted.len(), CURRENCIES.len());
        assert_eq!(sorted[0].code, "USD");
        assert_eq!(sorted[1].code, "EUR");
        for pair in sorted.windows(2) {
            assert!(pair[0].popularity < pair[1].popularity);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_used_before_unused_with_tie_break() -> Result<()> {
        let (service, clock, user) = make_service().await?;

        // JPY twice, then CHF and ZAR once each (ZAR more recent)
        service.track_currency_usage(user, "JPY").await?;
        clock.advance(10);
        service.track_currency_usage(user, "JPY").await?;
        clock.advance(10);
        service.track_currency_usage(user, "CHF").await?;
        clock.advance(10);
        service.track_currency_usage(user, "ZAR").await?;

        let sorted = service.get_sorted_currencies(user).await?;
        assert_eq!(sorted[0].code, "JPY");
        assert_eq!(sorted[1].code, "ZAR");
        assert_eq!(sorted[2].code, "CHF");
        // Unused tail starts with the most popular unused currency
        assert_eq!(sorted[3].code, "USD");
        assert_eq!(sorted.len(), CURRENCIES.len());

        Ok(())
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_ranking() -> Result<()> {
        let (service, _, user) = make_service().await?;

        let before = service.get_sorted_currencies(user).await?;
        assert_eq!(before[0].code, "USD");
        assert_eq!(service.cache_stats().sorted_currencies_cache_size, 1);

        service.track_currency_usage(user, "DKK").await?;

        // Invalidated on write, so the next read reflects the increment
        assert_eq!(service.cache_stats().sorted_currencies_cache_size, 0);
        let after = service.get_sorted_currencies(user).await?;
        assert_eq!(after[0].code, "DKK");

        Ok(())
    }

    #[tokio::test]
    async fn test_cache_serves_until_expiration() -> Result<()> {
        let (service, clock, user) = make_service().await?;

        service.get_sorted_currencies(user).await?;

        // Write behind the service's back: the cached list must keep being
        // served until the window lapses.
        usage::increment_usage(&service.pool, user, "NOK", clock.now_ms()).await?;

        let cached = service.get_sorted_currencies(user).await?;
        assert_eq!(cached[0].code, "USD");

        clock.advance(DEFAULT_RANKING_CACHE_EXPIRATION_MS + 1);
        let recomputed = service.get_sorted_currencies(user).await?;
        assert_eq!(recomputed[0].code, "NOK");

        Ok(())
    }

    #[tokio::test]
    async fn test_top_and_stream_forms() -> Result<()> {
        let (service, _, user) = make_service().await?;
        service.track_currency_usage(user, "SEK").await?;

        let top = service.get_top_currencies(user, 3).await?;
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].code, "SEK");
        assert_eq!(top[1].code, "USD");

        let streamed: Vec<Currency> =
            service.top_currencies_stream(user, 3).await?.collect().await;
        assert_eq!(streamed, top);

        Ok(())
    }

    #[tokio::test]
    async fn test_used_currencies_subset() -> Result<()> {
        let (service, clock, user) = make_service().await?;

        service.track_currency_usage(user, "EUR").await?;
        clock.advance(10);
        service.track_currency_usage(user, "EUR").await?;
        clock.advance(10);
        service.track_currency_usage(user, "THB").await?;

        let used = service.get_used_currencies(user).await?;
        let codes: Vec<&str> = used.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["EUR", "THB"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_codes_skipped_in_ranking() -> Result<()> {
        let (service, _, user) = make_service().await?;

        service.track_currency_usage(user, "DOGE").await?;
        service.track_currency_usage(user, "eur").await?;

        let sorted = service.get_sorted_currencies(user).await?;
        // Neither DOGE nor lowercase "eur" matches the static table
        assert_eq!(sorted.len(), CURRENCIES.len());
        assert_eq!(sorted[0].code, "USD");

        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_all_zeroes_stats() -> Result<()> {
        let (service, _, user) = make_service().await?;
        let pool = service.pool.clone();
        let other = create_user(&pool, "bob").await?;

        service.get_sorted_currencies(user).await?;
        service.get_sorted_currencies(other).await?;

        let stats = service.cache_stats();
        assert_eq!(stats.sorted_currencies_cache_size, 2);
        assert_eq!(stats.currency_usage_cache_size, 2);
        assert_eq!(stats.cache_timestamps_size, 2);
        assert_eq!(
            stats.cache_expiration_time_ms,
            DEFAULT_RANKING_CACHE_EXPIRATION_MS
        );

        service.invalidate_all_cache();

        let cleared = service.cache_stats();
        assert_eq!(cleared.sorted_currencies_cache_size, 0);
        assert_eq!(cleared.currency_usage_cache_size, 0);
        assert_eq!(cleared.cache_timestamps_size, 0);

        Ok(())
    }
}

// SPDX-License-Identifier: MIT

mod api;
mod clock;
mod config;
mod currencies;
mod db;
mod models;
mod ranking;
mod rate_cache;
mod transactions;
mod usage;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use csv::Writer;
use futures::StreamExt;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::api::ExchangeRateClient;
use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::Config;
use crate::ranking::{CurrencyRankingService, RankingCache};
use crate::rate_cache::ExchangeRateCache;

#[derive(Parser)]
#[command(name = "pennywise", version, about = "Multi-currency personal finance tracker")]
struct Cli {
    /// Acting user (created on first use)
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config.toml with the default settings
    Init,
    /// Record a transaction
    Add {
        amount: f64,
        currency: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List recent transactions with per-currency totals
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Edit a transaction; omitted fields are kept
    Edit {
        id: i64,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a transaction
    Rm { id: i64 },
    /// Convert an amount between currencies
    Convert {
        amount: f64,
        from: String,
        to: String,
    },
    /// Check whether a conversion is currently possible
    Check { from: String, to: String },
    /// Show currencies in picker order for the user
    Currencies {
        /// Only the N best-ranked currencies
        #[arg(long)]
        top: Option<usize>,
        /// Only currencies the user has actually used
        #[arg(long)]
        used: bool,
    },
    /// Show the user's currency usage counters
    Usage {
        #[arg(long)]
        top: Option<i64>,
    },
    /// Forget the user's currency usage history
    ResetUsage,
    /// Show exchange-rate and ranking cache statistics
    Stats,
    /// Clear the rate cache and the in-memory ranking cache
    ClearCache,
    /// Export transactions to CSV
    Export,
    /// Delete the acting user and all their data
    DeleteUser,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::default();

    if let Command::Init = cli.command {
        config::save_config(&config)?;
        println!("✅ Wrote config.toml");
        return Ok(());
    }

    let pool = db::create_db_pool(&config.database_url).await?;
    let user_name = cli.user.unwrap_or_else(|| config.default_user.clone());
    let user_id = transactions::get_or_create_user(&pool, &user_name).await?;

    let time_source = Arc::new(SystemTimeSource);
    let api_key = env::var("PENNYWISE_API_KEY").unwrap_or_default();
    let provider = Arc::new(ExchangeRateClient::new(config.api_base_url.clone(), api_key));
    let rate_cache = ExchangeRateCache::new(
        pool.clone(),
        provider,
        time_source.clone(),
        config.rate_ttl_ms,
    );
    let ranking = CurrencyRankingService::new(
        pool.clone(),
        RankingCache::new(config.ranking_cache_expiration_ms),
        time_source.clone(),
    );

    match cli.command {
        Command::Init => unreachable!("handled above"),
        Command::Add {
            amount,
            currency,
            description,
            category,
        } => {
            if !currencies::is_supported(&currency) {
                println!("⚠️  Warning: {} is not a known currency code", currency);
            }
            let id = transactions::add_transaction(
                &pool,
                user_id,
                amount,
                &currency,
                &description,
                category.as_deref(),
                time_source.now_ms(),
            )
            .await?;
            ranking.track_currency_usage(user_id, &currency).await?;
            println!("✅ Recorded transaction #{}: {} {}", id, amount, currency);
        }
        Command::List { limit } => {
            let txs = transactions::list_transactions(&pool, user_id, limit).await?;
            if txs.is_empty() {
                println!("No transactions for {}", user_name);
                return Ok(());
            }
            for tx in &txs {
                let when = chrono::DateTime::from_timestamp_millis(tx.occurred_at)
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "#{:<5} {:>12.2} {}  {}  {}{}",
                    tx.id,
                    tx.amount,
                    tx.currency,
                    when,
                    tx.description,
                    tx.category
                        .as_deref()
                        .map(|c| format!(" [{}]", c))
                        .unwrap_or_default(),
                );
            }
            println!("---");
            for (currency, total) in transactions::totals_by_currency(&pool, user_id).await? {
                println!("{:>18.2} {}", total, currency);
            }
        }
        Command::Edit {
            id,
            amount,
            currency,
            description,
            category,
        } => {
            let changed = transactions::update_transaction(
                &pool,
                id,
                amount,
                currency.as_deref(),
                description.as_deref(),
                category.as_deref(),
            )
            .await?;
            if changed {
                if let Some(tx) = transactions::get_transaction(&pool, id).await? {
                    // Count a changed currency against the transaction's owner
                    if currency.is_some() {
                        ranking.track_currency_usage(tx.user_id, &tx.currency).await?;
                    }
                    println!(
                        "✅ Transaction #{} is now {} {} {}",
                        tx.id, tx.amount, tx.currency, tx.description
                    );
                }
            } else {
                println!("No transaction #{}", id);
            }
        }
        Command::Rm { id } => {
            if transactions::delete_transaction(&pool, id).await? {
                println!("✅ Deleted transaction #{}", id);
            } else {
                println!("No transaction #{}", id);
            }
        }
        Command::Convert { amount, from, to } => {
            let result = rate_cache.convert(amount, &from, &to).await?;
            match result.value() {
                Some(value) if result.is_stale() => {
                    println!(
                        "{} {} = {:.4} {} (cached rate, may be out of date)",
                        amount, from, value, to
                    );
                }
                Some(value) => {
                    println!("{} {} = {:.4} {}", amount, from, value, to);
                }
                None => {
                    println!("Conversion {} -> {} unavailable", from, to);
                }
            }
        }
        Command::Check { from, to } => {
            if rate_cache.is_conversion_available(&from, &to).await? {
                println!("✅ {} -> {} available", from, to);
            } else {
                println!("{} -> {} unavailable", from, to);
            }
        }
        Command::Currencies { top, used } => {
            let list = if used {
                ranking.get_used_currencies(user_id).await?
            } else if let Some(n) = top {
                ranking.top_currencies_stream(user_id, n).await?.collect().await
            } else {
                ranking.get_sorted_currencies(user_id).await?
            };
            for currency in list {
                println!("{}  {:<4} {}", currency.code, currency.symbol, currency.name);
            }
        }
        Command::Usage { top } => {
            let records = match top {
                Some(n) => usage::get_top_for_user(&pool, user_id, n).await?,
                None => usage::get_usage_for_user(&pool, user_id).await?,
            };
            for record in &records {
                let last = chrono::DateTime::from_timestamp_millis(record.last_used)
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  used {} times, last on {}",
                    record.currency, record.usage_count, last
                );
            }
            let distinct = usage::count_currencies_for_user(&pool, user_id).await?;
            println!("---\n{} distinct currencies", distinct);
        }
        Command::ResetUsage => {
            usage::delete_all_for_user(&pool, user_id).await?;
            ranking.invalidate_cache(user_id);
            println!("✅ Cleared currency usage for {}", user_name);
        }
        Command::Stats => {
            let rates = rate_cache.cache_stats().await?;
            println!("Exchange-rate cache:");
            println!("  total:     {}", rates.total_cached);
            println!("  valid:     {}", rates.valid_cached);
            println!("  expired:   {}", rates.expired_cached);
            println!("  corrupted: {}", rates.corrupted_cached);

            let ranking_stats = ranking.cache_stats();
            println!("Ranking cache:");
            println!("  sorted lists:   {}", ranking_stats.sorted_currencies_cache_size);
            println!("  usage entries:  {}", ranking_stats.currency_usage_cache_size);
            println!("  timestamps:     {}", ranking_stats.cache_timestamps_size);
            println!("  expiration ms:  {}", ranking_stats.cache_expiration_time_ms);
        }
        Command::ClearCache => {
            rate_cache.clear_cache().await?;
            ranking.invalidate_all_cache();
            println!("✅ Caches cleared");
        }
        Command::Export => {
            let path = export_transactions_csv(&pool, user_id).await?;
            println!("✅ Transactions written to {}", path.display());
        }
        Command::DeleteUser => {
            transactions::delete_user(&pool, user_id).await?;
            ranking.invalidate_cache(user_id);
            println!("✅ Deleted user {} and all their data", user_name);
        }
    }

    Ok(())
}

async fn export_transactions_csv(pool: &sqlx::SqlitePool, user_id: i64) -> Result<PathBuf> {
    let output_dir = PathBuf::from("output");
    std::fs::create_dir_all(&output_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let csv_path = output_dir.join(format!("transactions_{}.csv", timestamp));
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "Id",
        "Amount",
        "Currency",
        "Description",
        "Category",
        "Occurred At",
    ])?;

    // No practical limit for an export
    let txs = transactions::list_transactions(pool, user_id, i64::MAX).await?;
    for tx in txs {
        let when = chrono::DateTime::from_timestamp_millis(tx.occurred_at)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        writer.write_record([
            tx.id.to_string(),
            tx.amount.to_string(),
            tx.currency,
            tx.description,
            tx.category.unwrap_or_default(),
            when,
        ])?;
    }
    writer.flush()?;

    Ok(csv_path)
}

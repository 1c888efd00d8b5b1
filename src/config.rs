// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    /// TTL for persisted exchange rates, in milliseconds.
    pub rate_ttl_ms: i64,
    /// Expiration window for the in-memory ranking cache, in milliseconds.
    pub ranking_cache_expiration_ms: i64,
    pub default_user: String,
}

impl Default for Config {
    fn default() -> Self {
        // Try to read from config.toml first
        if let Ok(config) = load_config() {
            return config;
        }

        // Fallback to hardcoded defaults
        Self {
            database_url: "sqlite:pennywise.db".to_string(),
            api_base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            rate_ttl_ms: crate::rate_cache::DEFAULT_RATE_TTL_MS,
            ranking_cache_expiration_ms: crate::ranking::DEFAULT_RANKING_CACHE_EXPIRATION_MS,
            default_user: "default".to_string(),
        }
    }
}

fn get_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}

pub fn load_config() -> anyhow::Result<Config> {
    let config_path = get_config_path();
    let config_str = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let config_path = get_config_path();
    let config_str = toml::to_string_pretty(config)?;
    fs::write(config_path, config_str)?;
    Ok(())
}

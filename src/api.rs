// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use reqwest::Client;

use crate::models::PairQuote;

/// Remote pair-rate lookup. A trait so the caching layer can be tested
/// against a scripted provider instead of the network.
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rate(&self, base: &str, target: &str) -> Result<PairQuote>;
}

pub struct ExchangeRateClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ExchangeRateClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl RateProvider for ExchangeRateClient {
    async fn fetch_rate(&self, base: &str, target: &str) -> Result<PairQuote> {
        if base.is_empty() || target.is_empty() {
            anyhow::bail!("currency code empty");
        }

        let url = format!(
            "{}/{}/pair/{}/{}",
            self.base_url,
            self.api_key,
            base.to_uppercase(),
            target.to_uppercase()
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let text = response.text().await.context("Failed to get response text")?;

        if !status.is_success() {
            anyhow::bail!("API request failed ({}): {}", status, text);
        }

        let quote: PairQuote =
            serde_json::from_str(&text).context("Failed to parse pair-rate response")?;

        if quote.result != "success" {
            anyhow::bail!("API reported failure: {}", quote.result);
        }
        if quote.conversion_rate <= 0.0 {
            anyhow::bail!("non-positive conversion rate: {}", quote.conversion_rate);
        }

        Ok(quote)
    }
}

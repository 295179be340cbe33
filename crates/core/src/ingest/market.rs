use crate::config::Settings;
use crate::ingest::types::ChartResponse;
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 4;
const DEFAULT_RETRIES: u32 = 2;

/// Last trade data for one symbol. A missing field means the provider had no
/// value, which downstream treats as an explicit unavailable state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub last_price: Option<f64>,
    pub last_volume: Option<u64>,
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

#[derive(Debug, Clone)]
pub struct YahooQuoteClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooQuoteClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Quote> {
        let res = self
            .http
            .get(self.url(symbol))
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await
            .context("quote request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "quote provider HTTP {status}");

        let chart: ChartResponse = res
            .json()
            .await
            .context("failed to parse quote chart response")?;

        Ok(quote_from_chart(&chart))
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooQuoteClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbol).await {
                Ok(quote) => return Ok(quote),
                Err(err) => {
                    if attempt > self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(250 << (attempt - 1));
                    tracing::warn!(symbol, attempt, ?backoff, error = %err, "quote fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// An absent result block or meta field maps to `None`, never an error.
fn quote_from_chart(chart: &ChartResponse) -> Quote {
    let Some(results) = chart.chart.result.as_deref() else {
        return Quote::default();
    };
    let Some(first) = results.first() else {
        return Quote::default();
    };
    Quote {
        last_price: first.meta.regular_market_price,
        last_volume: first.meta.regular_market_volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_meta_fields_to_quote() {
        let chart: ChartResponse = serde_json::from_value(json!({
            "chart": {"result": [{"meta": {
                "regularMarketPrice": 42.5,
                "regularMarketVolume": 1_500_000u64
            }}]}
        }))
        .unwrap();

        let quote = quote_from_chart(&chart);
        assert_eq!(quote.last_price, Some(42.5));
        assert_eq!(quote.last_volume, Some(1_500_000));
    }

    #[test]
    fn missing_result_or_fields_are_unavailable_not_errors() {
        let chart: ChartResponse =
            serde_json::from_value(json!({"chart": {"result": null}})).unwrap();
        assert_eq!(quote_from_chart(&chart), Quote::default());

        let chart: ChartResponse =
            serde_json::from_value(json!({"chart": {"result": [{"meta": {}}]}})).unwrap();
        assert_eq!(quote_from_chart(&chart), Quote::default());
    }
}

use crate::config::Settings;
use crate::ingest::types::{CompanyTickerMap, RecentFilings, SubmissionsResponse};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://data.sec.gov";
const TICKER_MAP_URL: &str = "https://www.sec.gov/files/company_tickers.json";
// EDGAR requires a contact-identifying user agent on every request.
const EDGAR_USER_AGENT: &str = "alphascan/0.1 (ops@alphascan.dev)";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const INSIDER_FORM: &str = "4";

/// Most recent in-window insider transaction for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsiderActivity {
    pub date: NaiveDate,
    pub description: String,
}

#[async_trait::async_trait]
pub trait FilingsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Latest insider transaction filed after `cutoff`, if any.
    async fn recent_insider_activity(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<Option<InsiderActivity>>;
}

#[derive(Debug)]
pub struct EdgarClient {
    http: reqwest::Client,
    base_url: String,
    cik_by_symbol: BTreeMap<String, String>,
}

impl EdgarClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .filings_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("FILINGS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(EDGAR_USER_AGENT));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build filings http client")?;

        Ok(Self {
            http,
            base_url,
            cik_by_symbol: BTreeMap::new(),
        })
    }

    /// Fetch the regulator's ticker directory and build the symbol -> CIK map.
    /// Callers treat failure as best-effort: without the map every insider
    /// lookup resolves to no activity.
    pub async fn load_ticker_map(&mut self) -> Result<usize> {
        let url = std::env::var("FILINGS_TICKER_MAP_URL")
            .unwrap_or_else(|_| TICKER_MAP_URL.to_string());

        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("ticker directory request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "ticker directory HTTP {status}");

        let entries: CompanyTickerMap = res
            .json()
            .await
            .context("failed to parse ticker directory")?;

        self.cik_by_symbol = entries
            .into_values()
            .map(|c| (c.ticker, format!("{:010}", c.cik_str)))
            .collect();

        Ok(self.cik_by_symbol.len())
    }

    pub fn cik_for(&self, symbol: &str) -> Option<&str> {
        self.cik_by_symbol.get(symbol).map(String::as_str)
    }
}

#[async_trait::async_trait]
impl FilingsProvider for EdgarClient {
    fn provider_name(&self) -> &'static str {
        "sec_edgar"
    }

    async fn recent_insider_activity(
        &self,
        symbol: &str,
        cutoff: NaiveDate,
    ) -> Result<Option<InsiderActivity>> {
        let Some(cik) = self.cik_for(symbol) else {
            return Ok(None);
        };

        let url = format!(
            "{}/submissions/CIK{cik}.json",
            self.base_url.trim_end_matches('/')
        );
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("submissions request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "filings provider HTTP {status}");

        let submissions: SubmissionsResponse = res
            .json()
            .await
            .context("failed to parse submissions response")?;

        Ok(latest_insider_filing(&submissions.filings.recent, cutoff))
    }
}

/// The recent-filings columns arrive newest first; only the newest insider
/// form is considered, and only when it falls inside the recency window.
fn latest_insider_filing(recent: &RecentFilings, cutoff: NaiveDate) -> Option<InsiderActivity> {
    let idx = recent.form.iter().position(|f| f == INSIDER_FORM)?;
    let raw_date = recent.filing_date.get(idx)?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").ok()?;
    if date <= cutoff {
        return None;
    }
    Some(InsiderActivity {
        date,
        description: "Form 4 (Trade)".to_string(),
    })
}

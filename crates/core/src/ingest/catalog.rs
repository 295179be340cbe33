use crate::config::Settings;
use crate::ingest::types::{Bill, BillsResponse};
use crate::policy::PolicyTable;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.congress.gov";
const DEFAULT_API_KEY: &str = "DEMO_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LIMIT: u32 = 25;
const TITLE_MAX_CHARS: usize = 60;

/// A legislative item classified into a sector with a market-impact score.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalyst {
    pub item_id: String,
    pub title: String,
    pub sponsor: String,
    pub sector: String,
    pub score: i32,
    pub note: String,
}

#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Latest classified legislative items. An empty result is valid; the
    /// refresh loop keeps the previous catalog on failure.
    async fn fetch_catalog(&self) -> Result<Vec<Catalyst>>;
}

#[derive(Debug, Clone)]
pub struct CongressCatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limit: u32,
    policy: Arc<PolicyTable>,
}

impl CongressCatalogClient {
    pub fn from_settings(settings: &Settings, policy: Arc<PolicyTable>) -> Result<Self> {
        let base_url = settings
            .catalog_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = settings
            .catalog_api_key
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());

        let timeout_secs = std::env::var("CATALOG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let limit = std::env::var("CATALOG_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_LIMIT);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build catalog http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            limit,
            policy,
        })
    }
}

#[async_trait::async_trait]
impl CatalogProvider for CongressCatalogClient {
    fn provider_name(&self) -> &'static str {
        "congress_gov"
    }

    async fn fetch_catalog(&self) -> Result<Vec<Catalyst>> {
        let url = format!("{}/v3/bill", self.base_url.trim_end_matches('/'));
        let limit = self.limit.to_string();
        let res = self
            .http
            .get(url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("limit", limit.as_str()),
                ("sort", "updateDate+desc"),
            ])
            .send()
            .await
            .context("catalog request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "catalog provider HTTP {status}");

        let listing: BillsResponse = res
            .json()
            .await
            .context("failed to parse catalog response")?;

        let catalog = classify_bills(&listing.bills, &self.policy);
        tracing::debug!(
            fetched = listing.bills.len(),
            classified = catalog.len(),
            "catalog refresh"
        );
        Ok(catalog)
    }
}

/// Run each item's title through the policy keyword rules; unclassified items
/// are dropped.
pub fn classify_bills(bills: &[Bill], policy: &PolicyTable) -> Vec<Catalyst> {
    bills
        .iter()
        .filter_map(|bill| {
            let title = bill.title.as_deref()?;
            let rule = policy.classify_title(title)?;
            Some(Catalyst {
                item_id: format!(
                    "{} {}",
                    bill.bill_type.as_deref().unwrap_or("HR").to_uppercase(),
                    bill.number.as_deref().unwrap_or("000"),
                ),
                title: truncate_title(title),
                sponsor: "Congress".to_string(),
                sector: rule.sector.clone(),
                score: rule.score,
                note: rule.note.clone(),
            })
        })
        .collect()
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_string();
    }
    let cut: String = title.chars().take(TITLE_MAX_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> PolicyTable {
        PolicyTable::from_json(
            &json!({
                "universe": ["LMT"],
                "sectors": {"DEFENSE": ["LMT", "RTX"]},
                "keyword_rules": [
                    {"keywords": ["DEFENSE"], "sector": "DEFENSE", "score": 92, "note": "Direct beneficiary: military spending."}
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn bill(bill_type: Option<&str>, number: Option<&str>, title: &str) -> Bill {
        Bill {
            bill_type: bill_type.map(str::to_string),
            number: number.map(str::to_string),
            title: Some(title.to_string()),
        }
    }

    #[test]
    fn classifies_matching_titles_and_drops_the_rest() {
        let bills = vec![
            bill(Some("hr"), Some("8070"), "National Defense Authorization Act"),
            bill(Some("S"), Some("12"), "Postal Service Naming Act"),
        ];

        let catalog = classify_bills(&bills, &policy());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].item_id, "HR 8070");
        assert_eq!(catalog[0].sector, "DEFENSE");
        assert_eq!(catalog[0].score, 92);
    }

    #[test]
    fn missing_type_and_number_get_placeholders() {
        let bills = vec![Bill {
            bill_type: None,
            number: None,
            title: Some("Defense Act".to_string()),
        }];

        let catalog = classify_bills(&bills, &policy());
        assert_eq!(catalog[0].item_id, "HR 000");
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "Defense ".repeat(20);
        let bills = vec![bill(Some("HR"), Some("1"), &long)];

        let catalog = classify_bills(&bills, &policy());
        assert!(catalog[0].title.ends_with("..."));
        assert_eq!(catalog[0].title.chars().count(), TITLE_MAX_CHARS + 3);
    }
}

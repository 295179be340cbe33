//! Wire shapes for the upstream providers. Only the fields the service reads
//! are modeled; everything else in the payloads is ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

// Market data: quote chart payload.

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    pub regular_market_volume: Option<u64>,
}

// Legislative catalog: bill listing.

#[derive(Debug, Clone, Deserialize)]
pub struct BillsResponse {
    #[serde(default)]
    pub bills: Vec<Bill>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bill {
    #[serde(rename = "type")]
    pub bill_type: Option<String>,
    pub number: Option<String>,
    pub title: Option<String>,
}

// Regulatory filings: submission history per company, column-oriented.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionsResponse {
    #[serde(default)]
    pub filings: Filings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Filings {
    #[serde(default)]
    pub recent: RecentFilings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentFilings {
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(rename = "filingDate", default)]
    pub filing_date: Vec<String>,
}

/// One entry of the regulator's ticker directory, used to resolve symbols to
/// 10-digit company identifiers.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyTicker {
    pub cik_str: u64,
    pub ticker: String,
}

pub type CompanyTickerMap = BTreeMap<String, CompanyTicker>;

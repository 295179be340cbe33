use crate::domain::signal::{Analysis, ScoreBands, VolumeSignal};
use crate::ingest::catalog::Catalyst;
use crate::ingest::filings::FilingsProvider;
use crate::ingest::market::MarketDataProvider;
use crate::policy::{PolicyTable, TradeAction};
use chrono::{Duration, Utc};
use std::sync::Arc;

const DEFAULT_INSIDER_CUTOFF_DAYS: i64 = 540;
const DEFAULT_HIGH_VOLUME_THRESHOLD: u64 = 1_000_000;
const NO_CATALYST_NOTE: &str = "No active policy catalyst.";
const NO_DISCLOSURE_NOTE: &str = "No recent activity";
const NO_INSIDER_NOTE: &str = "Monitoring";

pub struct Analyzer {
    market: Arc<dyn MarketDataProvider>,
    filings: Arc<dyn FilingsProvider>,
    policy: Arc<PolicyTable>,
    bands: ScoreBands,
    insider_cutoff_days: i64,
    high_volume_threshold: u64,
}

impl Analyzer {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        filings: Arc<dyn FilingsProvider>,
        policy: Arc<PolicyTable>,
        bands: ScoreBands,
    ) -> Self {
        let insider_cutoff_days = std::env::var("INSIDER_CUTOFF_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_INSIDER_CUTOFF_DAYS);

        let high_volume_threshold = std::env::var("HIGH_VOLUME_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HIGH_VOLUME_THRESHOLD);

        Self {
            market,
            filings,
            policy,
            bands,
            insider_cutoff_days,
            high_volume_threshold,
        }
    }

    /// Analyze one symbol against the current catalog. Never fails: every
    /// provider error is absorbed here and surfaces as an unavailable field,
    /// so one bad symbol cannot abort a batch.
    pub async fn analyze(&self, symbol: &str, catalog: &[Catalyst]) -> Analysis {
        let quote = match self.market.fetch_quote(symbol).await {
            Ok(quote) => Some(quote),
            Err(err) => {
                tracing::warn!(symbol, error = %err, "quote fetch failed; marking unavailable");
                None
            }
        };

        let price = quote.as_ref().and_then(|q| q.last_price);
        let volume = match &quote {
            None => VolumeSignal::Unavailable,
            Some(q) => match q.last_volume {
                Some(v) if v > self.high_volume_threshold => VolumeSignal::High,
                Some(_) => VolumeSignal::Neutral,
                None => VolumeSignal::Unavailable,
            },
        };

        let catalyst = catalog
            .iter()
            .find(|c| self.policy.sector_contains(&c.sector, symbol));

        let mut score = catalyst.map_or(self.bands.neutral, |c| c.score);
        let impact_note = catalyst.map_or_else(|| NO_CATALYST_NOTE.to_string(), |c| c.note.clone());

        if volume == VolumeSignal::High {
            score += self.bands.volume_bonus;
        }

        // Disclosure delta is additive with the catalyst base, then clamped.
        let disclosure_note = match self.policy.disclosure(symbol) {
            Some(d) => match d.action {
                TradeAction::Purchase => {
                    score += self.bands.disclosure_bonus;
                    format!("{} (Bought)", d.official)
                }
                TradeAction::Sale => {
                    score -= self.bands.disclosure_bonus;
                    format!("{} (Sold)", d.official)
                }
            },
            None => NO_DISCLOSURE_NOTE.to_string(),
        };

        let cutoff = Utc::now().date_naive() - Duration::days(self.insider_cutoff_days);
        let insider_note = match self.filings.recent_insider_activity(symbol, cutoff).await {
            Ok(Some(activity)) => {
                format!("{} {}", activity.description, activity.date.format("%b %d"))
            }
            Ok(None) => NO_INSIDER_NOTE.to_string(),
            Err(err) => {
                tracing::warn!(symbol, error = %err, "insider lookup failed");
                NO_INSIDER_NOTE.to_string()
            }
        };

        let score = self.bands.clamp(score);

        Analysis {
            symbol: symbol.to_string(),
            price,
            volume,
            score,
            rating: self.bands.rating(score),
            disclosure_note,
            insider_note,
            impact_note,
            catalyst_id: catalyst.map(|c| c.item_id.clone()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domain::signal::Rating;
    use crate::ingest::filings::InsiderActivity;
    use chrono::NaiveDate;
    use serde_json::json;

    fn base_policy() -> Arc<PolicyTable> {
        policy_json(json!({
            "universe": ["NVDA", "LMT", "TSLA"],
            "sectors": {
                "AI": ["NVDA", "AMD"],
                "DEFENSE": ["LMT"]
            },
            "disclosures": {
                "NVDA": {"official": "Rep. Example", "action": "purchase", "date": "2025-11-22"},
                "TSLA": {"official": "Sen. Example", "action": "sale", "date": "2025-12-01"}
            }
        }))
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_placeholder() {
        let analyzer = analyzer(
            StubMarket {
                fail_all: true,
                ..Default::default()
            },
            StubFilings {
                fail_all: true,
                ..Default::default()
            },
            base_policy(),
        );

        let out = analyzer.analyze("NVDA", &[]).await;
        assert_eq!(out.price, None);
        assert_eq!(out.volume, VolumeSignal::Unavailable);
        assert!(!out.has_market_data());
        assert_eq!(out.insider_note, "Monitoring");
        // Disclosure bonus still applies on top of the neutral base.
        assert_eq!(out.score, 50 + 25);
        assert_eq!(out.rating, Rating::StrongBuy);
    }

    #[tokio::test]
    async fn catalyst_base_plus_volume_and_disclosure_bonuses_clamped() {
        let analyzer = analyzer(
            StubMarket::default().with_quote("NVDA", 178.0, 5_000_000),
            StubFilings::default(),
            base_policy(),
        );
        let catalog = vec![catalyst("AI", 85)];

        let out = analyzer.analyze("NVDA", &catalog).await;
        assert_eq!(out.volume, VolumeSignal::High);
        // 85 base + 5 volume + 25 purchase = 115, clamped to 99.
        assert_eq!(out.score, 99);
        assert_eq!(out.rating, Rating::StrongBuy);
        assert_eq!(out.catalyst_id.as_deref(), Some("HR 85"));
        assert_eq!(out.disclosure_note, "Rep. Example (Bought)");
    }

    #[tokio::test]
    async fn sale_disclosure_subtracts_and_unclassified_stays_neutral() {
        let analyzer = analyzer(
            StubMarket::default().with_quote("TSLA", 250.0, 10_000),
            StubFilings::default(),
            base_policy(),
        );

        // TSLA is in no sector, so the base is neutral; the sale takes 25 off.
        let out = analyzer.analyze("TSLA", &[catalyst("AI", 85)]).await;
        assert_eq!(out.volume, VolumeSignal::Neutral);
        assert_eq!(out.score, 50 - 25);
        assert_eq!(out.rating, Rating::Sell);
        assert_eq!(out.catalyst_id, None);
        assert_eq!(out.impact_note, "No active policy catalyst.");
    }

    #[tokio::test]
    async fn insider_activity_is_formatted_into_the_note() {
        let mut filings = StubFilings::default();
        filings.activity.insert(
            "LMT".to_string(),
            InsiderActivity {
                date: NaiveDate::from_ymd_opt(2026, 1, 8).unwrap(),
                description: "Form 4 (Trade)".to_string(),
            },
        );

        let analyzer = analyzer(
            StubMarket::default().with_quote("LMT", 480.0, 900_000),
            filings,
            base_policy(),
        );

        let out = analyzer.analyze("LMT", &[catalyst("DEFENSE", 92)]).await;
        assert_eq!(out.insider_note, "Form 4 (Trade) Jan 08");
        assert_eq!(out.score, 92);
        assert_eq!(out.disclosure_note, "No recent activity");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete buy/hold/sell classification derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "STRONG_BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSignal {
    High,
    Neutral,
    Unavailable,
}

/// One symbol's signals for one sweep. Built once, never mutated; the next
/// sweep supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub price: Option<f64>,
    pub volume: VolumeSignal,
    pub score: i32,
    pub rating: Rating,
    pub disclosure_note: String,
    pub insider_note: String,
    pub impact_note: String,
    pub catalyst_id: Option<String>,
}

impl Analysis {
    /// A result only participates in published views when the market fetch
    /// actually produced a price.
    pub fn has_market_data(&self) -> bool {
        self.price.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub buys: Vec<Analysis>,
    pub cheap: Vec<Analysis>,
    pub sells: Vec<Analysis>,
}

/// Score thresholds and adjustment deltas. Tunable via SCORE_* env vars so the
/// rating logic stays configuration, not code.
#[derive(Debug, Clone)]
pub struct ScoreBands {
    pub strong_buy: i32,
    pub buy: i32,
    pub sell: i32,
    pub ceiling: i32,
    pub neutral: i32,
    pub volume_bonus: i32,
    pub disclosure_bonus: i32,
}

impl Default for ScoreBands {
    fn default() -> Self {
        Self {
            strong_buy: 75,
            buy: 60,
            sell: 45,
            ceiling: 99,
            neutral: 50,
            volume_bonus: 5,
            disclosure_bonus: 25,
        }
    }
}

impl ScoreBands {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("SCORE_STRONG_BUY_MIN") {
            if let Ok(n) = s.parse::<i32>() {
                out.strong_buy = n;
            }
        }

        if let Ok(s) = std::env::var("SCORE_BUY_MIN") {
            if let Ok(n) = s.parse::<i32>() {
                out.buy = n;
            }
        }

        if let Ok(s) = std::env::var("SCORE_SELL_MAX") {
            if let Ok(n) = s.parse::<i32>() {
                out.sell = n;
            }
        }

        if let Ok(s) = std::env::var("SCORE_CEILING") {
            if let Ok(n) = s.parse::<i32>() {
                out.ceiling = n;
            }
        }

        if let Ok(s) = std::env::var("SCORE_DISCLOSURE_BONUS") {
            if let Ok(n) = s.parse::<i32>() {
                out.disclosure_bonus = n;
            }
        }

        out
    }

    pub fn clamp(&self, score: i32) -> i32 {
        score.clamp(0, self.ceiling)
    }

    pub fn rating(&self, score: i32) -> Rating {
        if score >= self.strong_buy {
            Rating::StrongBuy
        } else if score >= self.buy {
            Rating::Buy
        } else if score <= self.sell {
            Rating::Sell
        } else {
            Rating::Hold
        }
    }
}

use crate::analyze::Analyzer;
use crate::domain::signal::{Analysis, Snapshot};
use crate::ingest::catalog::Catalyst;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_VIEW_SIZE: usize = 5;
const DEFAULT_CHEAP_PRICE_CEILING: f64 = 50.0;
const DEFAULT_INTERVAL_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on simultaneous outbound fetches during a sweep.
    pub concurrency: usize,
    pub view_size: usize,
    pub cheap_price_ceiling: f64,
    pub interval_secs: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            view_size: DEFAULT_VIEW_SIZE,
            cheap_price_ceiling: DEFAULT_CHEAP_PRICE_CEILING,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl ScanOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("SCAN_CONCURRENCY") {
            if let Ok(n) = s.parse::<usize>() {
                out.concurrency = n;
            }
        }

        if let Ok(s) = std::env::var("SCAN_VIEW_SIZE") {
            if let Ok(n) = s.parse::<usize>() {
                out.view_size = n;
            }
        }

        if let Ok(s) = std::env::var("SCAN_CHEAP_PRICE_CEILING") {
            if let Ok(n) = s.parse::<f64>() {
                out.cheap_price_ceiling = n;
            }
        }

        if let Ok(s) = std::env::var("SCAN_INTERVAL_SECS") {
            if let Ok(n) = s.parse::<u64>() {
                out.interval_secs = n;
            }
        }

        out
    }
}

/// Sweep the symbols through the analyzer with a bounded worker pool. Results
/// arrive in completion order; callers needing determinism sort afterwards.
/// Individual failures are already absorbed by the analyzer, so a slow or dead
/// upstream for one symbol never cancels its siblings.
pub async fn scan(
    analyzer: &Analyzer,
    symbols: &[String],
    catalog: &[Catalyst],
    concurrency: usize,
) -> Vec<Analysis> {
    let futures: Vec<_> = symbols
        .iter()
        .map(|symbol| analyzer.analyze(symbol, catalog))
        .collect();
    stream::iter(futures)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}

/// Partition one sweep's results into the published views. Only results that
/// carry market data participate. All orderings tie-break by symbol so that
/// repeated partitions of the same dataset are identical.
pub fn build_snapshot(
    results: Vec<Analysis>,
    opts: &ScanOptions,
    generated_at: DateTime<Utc>,
) -> Snapshot {
    let mut ranked: Vec<Analysis> = results.into_iter().filter(Analysis::has_market_data).collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.symbol.cmp(&b.symbol)));
    let buys: Vec<Analysis> = ranked.iter().take(opts.view_size).cloned().collect();

    let cheap: Vec<Analysis> = ranked
        .iter()
        .filter(|a| {
            a.price
                .is_some_and(|p| p > 0.0 && p < opts.cheap_price_ceiling)
        })
        .take(opts.view_size)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.symbol.cmp(&b.symbol)));
    let sells: Vec<Analysis> = ranked.iter().take(opts.view_size).cloned().collect();

    Snapshot {
        generated_at,
        buys,
        cheap,
        sells,
    }
}

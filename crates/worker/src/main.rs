use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alphascan_core::analyze::Analyzer;
use alphascan_core::cache::{self, CatalogCache, RefreshContext, ScanCache};
use alphascan_core::domain::signal::ScoreBands;
use alphascan_core::domain::symbol;
use alphascan_core::ingest::catalog::{CatalogProvider, CongressCatalogClient};
use alphascan_core::ingest::filings::{EdgarClient, FilingsProvider};
use alphascan_core::ingest::market::{MarketDataProvider, YahooQuoteClient};
use alphascan_core::policy::PolicyTable;
use alphascan_core::scan::ScanOptions;

#[derive(Debug, Parser)]
#[command(name = "alphascan_worker")]
struct Args {
    /// Comma-separated symbols overriding the policy universe.
    #[arg(long)]
    symbols: Option<String>,

    /// Worker pool size for the sweep.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Pretty-print the snapshot JSON.
    #[arg(long)]
    pretty: bool,

    /// Run the sweep but print only a summary line.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = alphascan_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut policy = PolicyTable::from_path(settings.policy_file())
        .with_context(|| format!("policy file {} is required", settings.policy_file()))?;

    if let Some(raw) = args.symbols.as_deref() {
        policy.universe = parse_symbol_list(raw)?;
    }
    let policy = Arc::new(policy);

    let mut options = ScanOptions::from_env();
    if let Some(n) = args.concurrency {
        options.concurrency = n;
    }

    let market: Arc<dyn MarketDataProvider> = Arc::new(YahooQuoteClient::from_settings(&settings)?);

    let mut edgar = EdgarClient::from_settings(&settings)?;
    if let Err(err) = edgar.load_ticker_map().await {
        tracing::warn!(error = %err, "identifier map load failed; insider lookups disabled");
    }
    let filings: Arc<dyn FilingsProvider> = Arc::new(edgar);

    let catalog_provider: Arc<dyn CatalogProvider> = Arc::new(
        CongressCatalogClient::from_settings(&settings, policy.clone())?,
    );

    let analyzer = Arc::new(Analyzer::new(
        market,
        filings,
        policy.clone(),
        ScoreBands::from_env(),
    ));

    let ctx = RefreshContext::new(
        analyzer,
        catalog_provider,
        policy,
        Arc::new(ScanCache::default()),
        Arc::new(CatalogCache::default()),
        options,
    );

    if let Err(err) = cache::refresh_once(&ctx).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "scan cycle failed");
        return Err(err);
    }

    let snapshot = ctx
        .cache
        .load()
        .context("scan cycle completed without publishing a snapshot")?;

    if args.dry_run {
        tracing::info!(
            buys = snapshot.buys.len(),
            cheap = snapshot.cheap.len(),
            sells = snapshot.sells.len(),
            generated_at = %snapshot.generated_at,
            "scan cycle complete (dry-run)"
        );
        return Ok(());
    }

    let rendered = if args.pretty {
        serde_json::to_string_pretty(snapshot.as_ref())?
    } else {
        serde_json::to_string(snapshot.as_ref())?
    };
    println!("{rendered}");

    Ok(())
}

fn parse_symbol_list(raw: &str) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        out.push(symbol::normalize(part)?);
    }
    anyhow::ensure!(!out.is_empty(), "--symbols must name at least one symbol");
    Ok(out)
}

fn init_sentry(settings: &alphascan_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_symbol_lists() {
        let out = parse_symbol_list("nvda, lmt ,F").unwrap();
        assert_eq!(out, ["NVDA", "LMT", "F"]);
    }

    #[test]
    fn rejects_empty_and_malformed_lists() {
        assert!(parse_symbol_list(" , ,").is_err());
        assert!(parse_symbol_list("AAPL;DROP").is_err());
    }
}

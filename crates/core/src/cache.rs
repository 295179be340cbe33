use crate::analyze::Analyzer;
use crate::domain::signal::{Analysis, Snapshot};
use crate::ingest::catalog::{Catalyst, CatalogProvider};
use crate::policy::PolicyTable;
use crate::scan::{build_snapshot, scan, ScanOptions};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Most recent published sweep. Written by exactly one writer (the refresh
/// loop), read by arbitrarily many handlers. The swap is a single `Arc`
/// assignment, so readers see either the old complete snapshot or the new
/// complete one, never a mix.
#[derive(Debug, Default)]
pub struct ScanCache {
    inner: RwLock<Option<Arc<Snapshot>>>,
}

impl ScanCache {
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// Named view of the latest snapshot. Unknown names and an empty cache
    /// both yield an empty list; reads never trigger fetches or block on an
    /// in-progress refresh.
    pub fn view(&self, name: &str) -> Vec<Analysis> {
        let Some(snapshot) = self.load() else {
            return Vec::new();
        };
        match name {
            "buys" => snapshot.buys.clone(),
            "cheap" => snapshot.cheap.clone(),
            "sells" => snapshot.sells.clone(),
            _ => Vec::new(),
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.load().map(|s| s.generated_at)
    }
}

/// Current classified catalog, retained across cycles when a refresh fails.
#[derive(Debug, Default)]
pub struct CatalogCache {
    inner: RwLock<Arc<Vec<Catalyst>>>,
}

impl CatalogCache {
    pub fn load(&self) -> Arc<Vec<Catalyst>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, catalog: Vec<Catalyst>) {
        let catalog = Arc::new(catalog);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = catalog;
    }
}

/// Everything one refresh cycle needs, shared between the periodic loop, the
/// one-shot worker, and tests.
pub struct RefreshContext {
    pub analyzer: Arc<Analyzer>,
    pub catalog_provider: Arc<dyn CatalogProvider>,
    pub policy: Arc<PolicyTable>,
    pub cache: Arc<ScanCache>,
    pub catalogs: Arc<CatalogCache>,
    pub options: ScanOptions,
    in_flight: AtomicBool,
}

impl RefreshContext {
    pub fn new(
        analyzer: Arc<Analyzer>,
        catalog_provider: Arc<dyn CatalogProvider>,
        policy: Arc<PolicyTable>,
        cache: Arc<ScanCache>,
        catalogs: Arc<CatalogCache>,
        options: ScanOptions,
    ) -> Self {
        Self {
            analyzer,
            catalog_provider,
            policy,
            cache,
            catalogs,
            options,
            in_flight: AtomicBool::new(false),
        }
    }
}

/// One complete refresh cycle: catalog, sweep, partition, publish. A cycle
/// that yields no market data at all leaves the previous snapshot in place
/// and reports the failure to the caller; readers never see the outage.
pub async fn refresh_once(ctx: &RefreshContext) -> Result<()> {
    match ctx.catalog_provider.fetch_catalog().await {
        Ok(catalog) if !catalog.is_empty() => ctx.catalogs.publish(catalog),
        Ok(_) => {
            tracing::debug!("catalog fetch returned no classified items; keeping previous catalog")
        }
        Err(err) => {
            tracing::warn!(error = %err, "catalog fetch failed; keeping previous catalog")
        }
    }

    if ctx.policy.universe.is_empty() {
        tracing::warn!("scan universe is empty; nothing to publish");
        return Ok(());
    }

    let catalog = ctx.catalogs.load();
    let results = scan(
        &ctx.analyzer,
        &ctx.policy.universe,
        &catalog,
        ctx.options.concurrency,
    )
    .await;

    let with_data = results.iter().filter(|a| a.has_market_data()).count();
    if with_data == 0 {
        anyhow::bail!(
            "no symbol out of {} returned market data; keeping previous snapshot",
            results.len()
        );
    }

    let snapshot = build_snapshot(results, &ctx.options, Utc::now());
    tracing::info!(
        with_data,
        buys = snapshot.buys.len(),
        cheap = snapshot.cheap.len(),
        sells = snapshot.sells.len(),
        "scan cycle published"
    );
    ctx.cache.publish(snapshot);

    Ok(())
}

/// Periodic refresh loop for the lifetime of the process. The first tick
/// fires immediately so the cache warms at startup. Cycle errors are logged
/// and retried on the next interval, never fatal.
pub async fn run(ctx: Arc<RefreshContext>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(ctx.options.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if ctx.in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!("previous scan cycle still running; skipping tick");
            continue;
        }

        if let Err(err) = refresh_once(&ctx).await {
            tracing::error!(error = %err, "scan cycle failed; retaining previous snapshot");
        }

        ctx.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::test_support::*;
    use crate::domain::signal::{Rating, VolumeSignal};
    use serde_json::json;

    struct StubCatalog {
        catalog: Vec<Catalyst>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl CatalogProvider for StubCatalog {
        fn provider_name(&self) -> &'static str {
            "stub_catalog"
        }

        async fn fetch_catalog(&self) -> Result<Vec<Catalyst>> {
            if self.fail {
                anyhow::bail!("stub outage");
            }
            Ok(self.catalog.clone())
        }
    }

    fn sample_analysis(symbol: &str, score: i32) -> Analysis {
        Analysis {
            symbol: symbol.to_string(),
            price: Some(10.0),
            volume: VolumeSignal::Neutral,
            score,
            rating: Rating::Hold,
            disclosure_note: String::new(),
            insider_note: String::new(),
            impact_note: String::new(),
            catalyst_id: None,
        }
    }

    fn snapshot(scores: &[(&str, i32)]) -> Snapshot {
        Snapshot {
            generated_at: Utc::now(),
            buys: scores.iter().map(|(s, n)| sample_analysis(s, *n)).collect(),
            cheap: Vec::new(),
            sells: Vec::new(),
        }
    }

    fn context(market: StubMarket, catalog: StubCatalog) -> RefreshContext {
        let policy = policy_json(json!({
            "universe": ["A", "B"],
            "sectors": {"AI": ["A"]}
        }));
        let analyzer = Arc::new(analyzer(market, StubFilings::default(), policy.clone()));
        RefreshContext::new(
            analyzer,
            Arc::new(catalog),
            policy,
            Arc::new(ScanCache::default()),
            Arc::new(CatalogCache::default()),
            ScanOptions::default(),
        )
    }

    #[test]
    fn reads_between_publishes_return_the_same_snapshot() {
        let cache = ScanCache::default();
        assert!(cache.load().is_none());
        assert!(cache.view("buys").is_empty());

        cache.publish(snapshot(&[("A", 90)]));
        let first = cache.load().unwrap();
        let second = cache.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.publish(snapshot(&[("B", 10)]));
        let third = cache.load().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.buys[0].symbol, "B");
        // The pre-swap handle still sees the old complete snapshot.
        assert_eq!(first.buys[0].symbol, "A");
    }

    #[test]
    fn unknown_view_name_is_empty_not_an_error() {
        let cache = ScanCache::default();
        cache.publish(snapshot(&[("A", 90)]));
        assert_eq!(cache.view("buys").len(), 1);
        assert!(cache.view("momentum").is_empty());
    }

    #[tokio::test]
    async fn successful_cycle_publishes_views() {
        let market = StubMarket::default()
            .with_quote("A", 10.0, 2_000_000)
            .with_quote("B", 100.0, 10);
        let ctx = context(
            market,
            StubCatalog {
                catalog: vec![catalyst("AI", 85)],
                fail: false,
            },
        );

        refresh_once(&ctx).await.unwrap();

        let snapshot = ctx.cache.load().unwrap();
        assert_eq!(snapshot.buys.len(), 2);
        assert_eq!(snapshot.buys[0].symbol, "A");
        assert_eq!(ctx.catalogs.load().len(), 1);
        assert!(ctx.cache.last_updated().is_some());
    }

    #[tokio::test]
    async fn total_fetch_failure_keeps_previous_snapshot() {
        let ctx = context(
            StubMarket {
                fail_all: true,
                ..Default::default()
            },
            StubCatalog {
                catalog: Vec::new(),
                fail: true,
            },
        );

        ctx.cache.publish(snapshot(&[("A", 90)]));
        let before = ctx.cache.load().unwrap();

        let res = refresh_once(&ctx).await;
        assert!(res.is_err());

        let after = ctx.cache.load().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.buys[0].symbol, "A");
    }

    #[tokio::test]
    async fn catalog_failure_retains_previous_catalog_but_still_scans() {
        let market = StubMarket::default().with_quote("A", 10.0, 100);
        let ctx = context(
            market,
            StubCatalog {
                catalog: Vec::new(),
                fail: true,
            },
        );
        ctx.catalogs.publish(vec![catalyst("AI", 85)]);

        refresh_once(&ctx).await.unwrap();

        assert_eq!(ctx.catalogs.load().len(), 1);
        let snapshot = ctx.cache.load().unwrap();
        let a = snapshot.buys.iter().find(|x| x.symbol == "A").unwrap();
        assert_eq!(a.score, 85);
    }
}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alphascan_core::analyze::Analyzer;
use alphascan_core::cache::{CatalogCache, RefreshContext, ScanCache};
use alphascan_core::domain::signal::{Analysis, ScoreBands};
use alphascan_core::domain::symbol;
use alphascan_core::ingest::catalog::{CatalogProvider, CongressCatalogClient};
use alphascan_core::ingest::filings::{EdgarClient, FilingsProvider};
use alphascan_core::ingest::market::{MarketDataProvider, YahooQuoteClient};
use alphascan_core::policy::PolicyTable;
use alphascan_core::scan::{scan, ScanOptions};

// Worker pool size for on-demand /api/signals fan-out.
const SIGNALS_CONCURRENCY: usize = 6;
const MAX_PEERS: usize = 5;

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

    let policy = match PolicyTable::from_path(settings.policy_file()) {
        Ok(policy) => Arc::new(policy),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %e,
                path = settings.policy_file(),
                "policy file unavailable; starting API with an empty policy table"
            );
            Arc::new(PolicyTable::default())
        }
    };

    let market: Arc<dyn MarketDataProvider> = Arc::new(YahooQuoteClient::from_settings(&settings)?);

    let mut edgar = EdgarClient::from_settings(&settings)?;
    match edgar.load_ticker_map().await {
        Ok(count) => tracing::info!(count, "company identifier map loaded"),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::warn!(error = %e, "identifier map load failed; insider lookups disabled");
        }
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
    let cache = Arc::new(ScanCache::default());
    let catalogs = Arc::new(CatalogCache::default());

    let ctx = Arc::new(RefreshContext::new(
        analyzer.clone(),
        catalog_provider,
        policy.clone(),
        cache.clone(),
        catalogs.clone(),
        ScanOptions::from_env(),
    ));
    tokio::spawn(alphascan_core::cache::run(ctx));

    let state = AppState {
        analyzer,
        policy,
        cache,
        catalogs,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/scanner", get(get_scanner))
        .route("/api/signals", get(get_signals))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
    policy: Arc<PolicyTable>,
    cache: Arc<ScanCache>,
    catalogs: Arc<CatalogCache>,
}

#[derive(Debug, Deserialize)]
struct ScannerParams {
    view: Option<String>,
}

/// Cached view read; serves the latest snapshot without any live fetches.
async fn get_scanner(
    State(state): State<AppState>,
    Query(params): Query<ScannerParams>,
) -> Json<Vec<Analysis>> {
    let view = params.view.as_deref().unwrap_or("buys");
    Json(state.cache.view(view))
}

#[derive(Debug, Deserialize)]
struct SignalsParams {
    symbol: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// On-demand analysis; bypasses the cache and always issues fresh fetches.
async fn get_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsParams>,
) -> Result<Json<Vec<Analysis>>, (StatusCode, Json<ErrorBody>)> {
    let symbol = symbol::normalize(params.symbol.as_deref().unwrap_or_default())
        .map_err(bad_request)?;

    let catalog = state.catalogs.load();
    let results = match params.mode.as_deref().unwrap_or("peers") {
        "single" => vec![state.analyzer.analyze(&symbol, &catalog).await],
        "peers" => {
            let mut symbols = vec![symbol.clone()];
            symbols.extend(
                state
                    .policy
                    .peers_of(&symbol)
                    .iter()
                    .take(MAX_PEERS)
                    .cloned(),
            );

            let mut results = scan(&state.analyzer, &symbols, &catalog, SIGNALS_CONCURRENCY).await;
            // Primary symbol first, then peers in symbol order.
            results.sort_by_key(|a| (a.symbol != symbol, a.symbol.clone()));
            results
        }
        other => {
            return Err(bad_request(anyhow::anyhow!(
                "unknown mode {other:?} (expected \"single\" or \"peers\")"
            )))
        }
    };

    Ok(Json(results))
}

fn bad_request(err: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: format!("{err:#}"),
        }),
    )
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

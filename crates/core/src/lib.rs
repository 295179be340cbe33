pub mod analyze;
pub mod cache;
pub mod domain;
pub mod ingest;
pub mod policy;
pub mod scan;

pub mod config {
    const DEFAULT_POLICY_FILE: &str = "policy.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub market_data_base_url: Option<String>,
        pub filings_base_url: Option<String>,
        pub catalog_base_url: Option<String>,
        pub catalog_api_key: Option<String>,
        pub policy_file: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                filings_base_url: std::env::var("FILINGS_BASE_URL").ok(),
                catalog_base_url: std::env::var("CATALOG_BASE_URL").ok(),
                catalog_api_key: std::env::var("CATALOG_API_KEY").ok(),
                policy_file: std::env::var("POLICY_FILE").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn policy_file(&self) -> &str {
            self.policy_file.as_deref().unwrap_or(DEFAULT_POLICY_FILE)
        }
    }
}

use std::net::SocketAddr;
use std::time::Duration;

use pricekeeper_core::PricingConfig;

/// Server settings read from `PK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow_origins: Vec<String>,
    pub request_timeout: Duration,
    pub alpha_vantage_api_key: Option<String>,
    pub scheduler_enabled: bool,
    pub cache_duration_secs: Option<u64>,
    pub max_symbols_per_sync: Option<usize>,
}

impl Config {
    pub fn from_env() -> Self {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let listen_addr = std::env::var("PK_LISTEN_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8088)));
        let db_path =
            std::env::var("PK_DB_PATH").unwrap_or_else(|_| "./db/pricekeeper.db".to_string());
        let cors_allow_origins = std::env::var("PK_CORS_ALLOW_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| vec!["*".to_string()]);
        let request_timeout_ms = env_parse("PK_REQUEST_TIMEOUT_MS").unwrap_or(60_000);
        let alpha_vantage_api_key = std::env::var("PK_ALPHA_VANTAGE_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let scheduler_enabled = std::env::var("PK_SCHEDULER_ENABLED")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        Self {
            listen_addr,
            db_path,
            cors_allow_origins,
            request_timeout: Duration::from_millis(request_timeout_ms),
            alpha_vantage_api_key,
            scheduler_enabled,
            cache_duration_secs: env_parse("PK_CACHE_DURATION_SECS"),
            max_symbols_per_sync: env_parse("PK_MAX_SYMBOLS_PER_SYNC"),
        }
    }

    /// Pricing defaults with the environment overrides applied.
    pub fn pricing_config(&self) -> PricingConfig {
        let mut pricing = PricingConfig::default();
        if let Some(secs) = self.cache_duration_secs {
            pricing.cache_duration_secs = secs;
        }
        if let Some(max) = self.max_symbols_per_sync {
            pricing.scheduler.max_symbols_per_sync = max;
        }
        pricing.scheduler.enabled = self.scheduler_enabled;
        pricing
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {}", key, raw);
            None
        }
    }
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use pricekeeper_core::{
    prices::{PriceCacheStore, PriceService, PriceServiceTrait},
    sync::{PriceSyncScheduler, SymbolPriorityStore, SyncJobStore, SyncRunner},
    MarketStatusSource,
};
use pricekeeper_market_data::{FallbackChain, MarketCalendar, TradingHours, YahooIndexProbe};
use pricekeeper_storage_sqlite::{
    db::{self, write_actor},
    PriceCacheRepository, SymbolPriorityRepository, SyncJobRepository,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Timeout of one reference index probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct AppState {
    pub price_service: Arc<dyn PriceServiceTrait>,
    pub sync_scheduler: Arc<PriceSyncScheduler>,
    pub db_path: String,
}

pub fn init_tracing() {
    let log_format = std::env::var("PK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Production wiring: live providers and the Yahoo-backed market calendar.
pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let chain = Arc::new(FallbackChain::with_default_providers(
        config.alpha_vantage_api_key.clone(),
    ));
    for health in chain.provider_health() {
        tracing::info!(
            "Registered price provider {} for {:?}",
            health.provider_id,
            health.asset_kinds
        );
    }

    let probe = YahooIndexProbe::new(PROBE_TIMEOUT)?;
    let market: Arc<dyn MarketStatusSource> =
        Arc::new(MarketCalendar::new(TradingHours::default(), Arc::new(probe)));

    assemble_state(config, chain, market).await
}

/// Open the database and wire services around the given chain and market source.
pub async fn assemble_state(
    config: &Config,
    chain: Arc<FallbackChain>,
    market: Arc<dyn MarketStatusSource>,
) -> anyhow::Result<Arc<AppState>> {
    let pricing = config.pricing_config();
    pricing.validate()?;

    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = write_actor::spawn_writer((*pool).clone());

    let cache: Arc<dyn PriceCacheStore> =
        Arc::new(PriceCacheRepository::new(pool.clone(), writer.clone()));
    let priorities: Arc<dyn SymbolPriorityStore> =
        Arc::new(SymbolPriorityRepository::new(pool.clone(), writer.clone()));
    let jobs: Arc<dyn SyncJobStore> = Arc::new(SyncJobRepository::new(pool.clone(), writer));

    let runner = Arc::new(SyncRunner::new(
        chain.clone(),
        cache.clone(),
        priorities.clone(),
        jobs.clone(),
        pricing.scheduler.clone(),
    ));
    let sync_scheduler = Arc::new(PriceSyncScheduler::new(runner, market.clone(), jobs));

    let price_service: Arc<dyn PriceServiceTrait> = Arc::new(PriceService::new(
        cache, priorities, chain, market, pricing,
    ));

    Ok(Arc::new(AppState {
        price_service,
        sync_scheduler,
        db_path,
    }))
}

//! Tunables for the price service and the background scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{Error, Result};
use pricekeeper_market_data::HOME_CURRENCY;

/// Price service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PricingConfig {
    /// Freshness window of a cached price while the market is open.
    pub cache_duration_secs: u64,
    /// Budget for one request-path lookup through the provider chain.
    pub request_deadline_secs: u64,
    pub home_currency: String,
    pub bulk_concurrency: usize,
    pub scheduler: SchedulerConfig,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_duration_secs: DEFAULT_CACHE_DURATION_SECS,
            request_deadline_secs: DEFAULT_REQUEST_DEADLINE_SECS,
            home_currency: HOME_CURRENCY.to_string(),
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PricingConfig {
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_duration_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    /// Reject settings that would make the service misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.cache_duration_secs == 0 {
            return Err(Error::InvalidConfigValue(
                "cache duration must be positive".to_string(),
            ));
        }
        if self.request_deadline_secs == 0 {
            return Err(Error::InvalidConfigValue(
                "request deadline must be positive".to_string(),
            ));
        }
        if self.bulk_concurrency == 0 {
            return Err(Error::InvalidConfigValue(
                "bulk concurrency must be positive".to_string(),
            ));
        }
        self.scheduler.validate()
    }
}

/// Background sync cadence and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub market_hours_interval_secs: u64,
    pub max_symbols_per_sync: usize,
    pub symbol_delay_ms: u64,
    pub jitter_max_ms: u64,
    pub progress_flush_every: usize,
    pub fast_batch_size: usize,
    pub fast_batch_delay_ms: u64,
    pub fast_budget_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            market_hours_interval_secs: DEFAULT_MARKET_HOURS_INTERVAL_SECS,
            max_symbols_per_sync: DEFAULT_MAX_SYMBOLS_PER_SYNC,
            symbol_delay_ms: DEFAULT_SYMBOL_DELAY_MS,
            jitter_max_ms: DEFAULT_JITTER_MAX_MS,
            progress_flush_every: DEFAULT_PROGRESS_FLUSH_EVERY,
            fast_batch_size: DEFAULT_FAST_BATCH_SIZE,
            fast_batch_delay_ms: DEFAULT_FAST_BATCH_DELAY_MS,
            fast_budget_secs: DEFAULT_FAST_BUDGET_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn market_hours_interval(&self) -> Duration {
        Duration::from_secs(self.market_hours_interval_secs)
    }

    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }

    pub fn jitter_max(&self) -> Duration {
        Duration::from_millis(self.jitter_max_ms)
    }

    pub fn fast_batch_delay(&self) -> Duration {
        Duration::from_millis(self.fast_batch_delay_ms)
    }

    pub fn fast_budget(&self) -> Duration {
        Duration::from_secs(self.fast_budget_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_symbols_per_sync == 0 {
            return Err(Error::InvalidConfigValue(
                "max symbols per sync must be positive".to_string(),
            ));
        }
        if self.fast_batch_size == 0 {
            return Err(Error::InvalidConfigValue(
                "fast batch size must be positive".to_string(),
            ));
        }
        if self.progress_flush_every == 0 {
            return Err(Error::InvalidConfigValue(
                "progress flush interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PricingConfig::default();
        assert_eq!(config.cache_duration(), Duration::from_secs(1800));
        assert_eq!(config.request_deadline(), Duration::from_secs(20));
        assert_eq!(config.home_currency, "INR");
        assert_eq!(config.scheduler.max_symbols_per_sync, 50);
        assert_eq!(config.scheduler.symbol_delay(), Duration::from_secs(3));
        assert_eq!(config.scheduler.fast_budget(), Duration::from_secs(25));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PricingConfig =
            serde_json::from_str(r#"{"cacheDurationSecs": 60, "scheduler": {"enabled": false}}"#)
                .unwrap();
        assert_eq!(config.cache_duration_secs, 60);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.fast_batch_size, 5);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = PricingConfig::default();
        config.scheduler.fast_batch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue(_))
        ));
    }
}

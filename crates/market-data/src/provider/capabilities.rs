//! Provider capabilities and call budget configuration.
//!
//! This module defines structures for describing what a price provider can
//! price and how hard the fallback chain may lean on it.

use std::time::Duration;

use crate::models::AssetKind;
use crate::registry::CircuitBreakerConfig;

/// Describes the capabilities of a price provider.
///
/// Used by the fallback chain to decide which links are eligible for a
/// requested asset kind.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Asset kinds this provider can price.
    pub asset_kinds: &'static [AssetKind],

    /// Whether the provider serves intraday prices, as opposed to end-of-day
    /// values only (fund NAVs).
    pub intraday: bool,
}

impl ProviderCapabilities {
    pub fn supports(&self, kind: AssetKind) -> bool {
        self.asset_kinds.contains(&kind)
    }
}

/// How the chain treats one provider: circuit tuning plus the per-call timeout.
#[derive(Clone, Debug)]
pub struct ProviderBudget {
    /// Circuit breaker thresholds for this provider.
    pub circuit: CircuitBreakerConfig,

    /// Upper bound on a single `fetch_quote` call, retries included.
    pub call_timeout: Duration,
}

impl ProviderBudget {
    pub fn new(
        failure_threshold: u32,
        recovery_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            circuit: CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout,
                ..CircuitBreakerConfig::default()
            },
            call_timeout,
        }
    }
}

impl Default for ProviderBudget {
    fn default() -> Self {
        Self {
            circuit: CircuitBreakerConfig::default(),
            call_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_checks_asset_kinds() {
        let caps = ProviderCapabilities {
            asset_kinds: &[AssetKind::Equity, AssetKind::Metal],
            intraday: true,
        };
        assert!(caps.supports(AssetKind::Equity));
        assert!(caps.supports(AssetKind::Metal));
        assert!(!caps.supports(AssetKind::MutualFund));
    }

    #[test]
    fn test_budget_keeps_default_half_open_threshold() {
        let budget = ProviderBudget::new(3, Duration::from_secs(300), Duration::from_secs(10));
        assert_eq!(budget.circuit.failure_threshold, 3);
        assert_eq!(budget.circuit.half_open_success_threshold, 2);
        assert_eq!(budget.call_timeout, Duration::from_secs(10));
    }
}

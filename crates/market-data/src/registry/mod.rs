//! Provider orchestration.
//!
//! This module provides:
//! - Per-provider circuit breaking for fault tolerance
//! - The fallback chain that tries providers in priority order

mod chain;
mod circuit_breaker;

pub use chain::{ChainLink, FallbackChain, ProviderHealth};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};

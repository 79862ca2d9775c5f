//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern so one failing provider stops being
//! called until it has had time to recover. Each provider in the fallback chain
//! owns one breaker instance:
//!
//! - **Closed**: Normal operation, calls go through.
//! - **Open**: Provider is failing, calls are rejected without being made.
//! - **HalfOpen**: Recovery trial; one failure reopens, enough successes close.
//!
//! The breaker is in-memory and resets on process restart.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Default number of failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of successful requests needed to close the circuit from HalfOpen.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// Testing recovery - trial requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before testing recovery.
    pub recovery_timeout: Duration,
    /// Number of HalfOpen successes needed to close the circuit.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

/// Mutable state of one circuit.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_half_open_successes: u32,
    /// Monotonic time of the last failure (drives the recovery timeout).
    last_failure: Option<Instant>,
    /// Wall-clock mirror of `last_failure` for reporting.
    last_failure_at: Option<DateTime<Utc>>,
    last_transition_at: DateTime<Utc>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_half_open_successes: 0,
            last_failure: None,
            last_failure_at: None,
            last_transition_at: Utc::now(),
        }
    }

    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.last_transition_at = Utc::now();
        match to {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.consecutive_half_open_successes = 0;
            }
            CircuitState::HalfOpen => self.consecutive_half_open_successes = 0,
            CircuitState::Open => {}
        }
    }

    fn mark_failure(&mut self) {
        self.last_failure = Some(Instant::now());
        self.last_failure_at = Some(Utc::now());
    }
}

/// Point-in-time view of a breaker, for status endpoints and tests.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_half_open_successes: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_transition_at: DateTime<Utc>,
}

/// Circuit breaker guarding a single provider.
///
/// All state lives behind one mutex that is never held across an `.await`,
/// so concurrent callers see atomic transitions.
pub struct CircuitBreaker {
    provider: ProviderId,
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new(provider: ProviderId) -> Self {
        Self::with_config(provider, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom configuration.
    pub fn with_config(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            circuit: Mutex::new(Circuit::new()),
            config,
        }
    }

    /// Provider this breaker guards.
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuit, recovering from poison if necessary.
    ///
    /// The worst case of a poisoned circuit is slightly stale counters,
    /// which is better than panicking on the request path.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Circuit breaker mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Run `operation` through the breaker.
    ///
    /// Rejects with [`MarketDataError::CircuitOpen`] without invoking the
    /// operation while the circuit is open. Outcomes are recorded according to
    /// [`MarketDataError::counts_against_circuit`].
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, MarketDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        if !self.is_available() {
            debug!("Circuit breaker: '{}' is open, rejecting call", self.provider);
            return Err(MarketDataError::CircuitOpen {
                provider: self.provider.to_string(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                if e.counts_against_circuit() {
                    self.record_failure();
                } else {
                    debug!(
                        "Circuit breaker: '{}' returned {}, not counted",
                        self.provider, e
                    );
                }
                Err(e)
            }
        }
    }

    /// Whether a call would currently be let through.
    ///
    /// Returns true if the circuit is Closed or HalfOpen. An Open circuit
    /// whose recovery timeout has elapsed is moved to HalfOpen here, so status
    /// queries and [`execute`](Self::execute) always agree.
    pub fn is_available(&self) -> bool {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = circuit
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        self.provider
                    );
                    circuit.transition(CircuitState::HalfOpen);
                }
                recovered
            }
        }
    }

    /// Record a successful call.
    ///
    /// In Closed state: resets the failure count.
    /// In HalfOpen state: counts towards closing the circuit.
    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();

        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures > 0 {
                    debug!(
                        "Circuit breaker: success for '{}', failure count reset",
                        self.provider
                    );
                }
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.consecutive_half_open_successes += 1;
                debug!(
                    "Circuit breaker: success for '{}' in HalfOpen ({}/{})",
                    self.provider,
                    circuit.consecutive_half_open_successes,
                    self.config.half_open_success_threshold
                );

                if circuit.consecutive_half_open_successes
                    >= self.config.half_open_success_threshold
                {
                    info!(
                        "Circuit breaker: closing circuit for '{}' after {} successes",
                        self.provider, circuit.consecutive_half_open_successes
                    );
                    circuit.transition(CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // A call admitted before another caller tripped the circuit.
                debug!(
                    "Circuit breaker: late success for '{}' while Open, ignored",
                    self.provider
                );
            }
        }
    }

    /// Record a failed call.
    ///
    /// In Closed state the circuit opens once the threshold is reached.
    /// In HalfOpen state any failure immediately reopens the circuit.
    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();
        circuit.mark_failure();

        match circuit.state {
            CircuitState::Closed => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        "Circuit breaker: opening circuit for '{}' after {} failures",
                        self.provider, circuit.consecutive_failures
                    );
                    circuit.transition(CircuitState::Open);
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        self.provider,
                        circuit.consecutive_failures,
                        self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                circuit.consecutive_failures += 1;
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failure in HalfOpen",
                    self.provider
                );
                circuit.transition(CircuitState::Open);
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    self.provider
                );
            }
        }
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.lock_circuit().state
    }

    /// Number of consecutive failures recorded.
    pub fn failure_count(&self) -> u32 {
        self.lock_circuit().consecutive_failures
    }

    /// Force the circuit to Closed regardless of history.
    pub fn reset(&self) {
        let mut circuit = self.lock_circuit();
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            self.provider
        );
        circuit.transition(CircuitState::Closed);
        circuit.last_failure = None;
        circuit.last_failure_at = None;
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let circuit = self.lock_circuit();
        CircuitSnapshot {
            provider: self.provider.to_string(),
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
            consecutive_half_open_successes: circuit.consecutive_half_open_successes,
            last_failure_at: circuit.last_failure_at,
            last_transition_at: circuit.last_transition_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failure_threshold: u32, recovery_ms: u64, half_open: u32) -> CircuitBreaker {
        CircuitBreaker::with_config(
            Cow::Borrowed("TEST_PROVIDER"),
            CircuitBreakerConfig {
                failure_threshold,
                recovery_timeout: Duration::from_millis(recovery_ms),
                half_open_success_threshold: half_open,
            },
        )
    }

    fn provider_failure() -> MarketDataError {
        MarketDataError::ProviderError {
            provider: "TEST_PROVIDER".to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new(Cow::Borrowed("TEST_PROVIDER"));

        assert!(cb.is_available());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.snapshot().last_failure_at.is_none());
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = breaker(3, 60_000, 2);

        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_available());
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert!(!cb.is_available());
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.snapshot().last_failure_at.is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, 60_000, 2);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);

        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_open_circuit_never_invokes_operation() {
        let cb = breaker(1, 60_000, 1);
        let calls = AtomicUsize::new(0);

        let _ = cb
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(provider_failure())
            })
            .await;
        assert_eq!(cb.state(), CircuitState::Open);

        for _ in 0..5 {
            let result = cb
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MarketDataError>(())
                })
                .await;
            assert!(matches!(result, Err(MarketDataError::CircuitOpen { .. })));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_threshold_scenario_open_then_recover_to_closed() {
        let cb = breaker(3, 30, 2);

        for _ in 0..3 {
            let _ = cb.execute(|| async { Err::<(), _>(provider_failure()) }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(1));
        let rejected = cb.execute(|| async { Ok::<_, MarketDataError>(1) }).await;
        assert!(matches!(rejected, Err(MarketDataError::CircuitOpen { .. })));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cb.execute(|| async { Ok::<_, MarketDataError>(1) }).await.unwrap(), 1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert_eq!(cb.execute(|| async { Ok::<_, MarketDataError>(2) }).await.unwrap(), 2);
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.consecutive_half_open_successes, 0);
    }

    #[test]
    fn test_circuit_transitions_to_half_open() {
        let cb = breaker(1, 10, 1);

        cb.record_failure();
        assert!(!cb.is_available());
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));

        assert!(cb.is_available());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_single_failure_reopens() {
        let cb = breaker(1, 10, 3);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        cb.is_available();

        // Accumulated successes don't protect the trial state
        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
    }

    #[tokio::test]
    async fn test_neutral_errors_do_not_change_state() {
        let cb = breaker(1, 60_000, 1);

        let result = cb
            .execute(|| async {
                Err::<(), _>(MarketDataError::SymbolNotFound("NOPE".to_string()))
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(_))));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_manual_reset() {
        let cb = breaker(1, 60_000, 2);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.is_available());
    }
}

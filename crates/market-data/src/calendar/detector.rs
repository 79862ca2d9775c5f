use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::models::{MarketStatus, MarketStatusReason};

use super::hours::{SessionPhase, TradingHours};
use super::probe::IndexProbe;

/// Decides whether the home exchange is trading.
///
/// Cheap schedule checks run first; only inside the trading window is the
/// reference index probed, to catch unscheduled holidays. Results are reused
/// for `TradingHours::status_ttl`.
pub struct MarketCalendar {
    hours: TradingHours,
    probe: Arc<dyn IndexProbe>,
    cached: RwLock<Option<MarketStatus>>,
}

impl MarketCalendar {
    pub fn new(hours: TradingHours, probe: Arc<dyn IndexProbe>) -> Self {
        Self {
            hours,
            probe,
            cached: RwLock::new(None),
        }
    }

    pub fn hours(&self) -> &TradingHours {
        &self.hours
    }

    /// Current status, served from cache while it is younger than the TTL.
    pub async fn get_status(&self) -> MarketStatus {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.hours.status_ttl)
            .unwrap_or(chrono::Duration::zero());

        if let Some(status) = *self.cached.read().await {
            if now - status.as_of < ttl {
                return status;
            }
        }

        let status = self.status_at(now).await;
        let mut cached = self.cached.write().await;
        if cached.map(|c| c.reason) != Some(status.reason) {
            info!(
                "{} market status: {:?} (open: {})",
                self.hours.exchange, status.reason, status.is_open
            );
        }
        *cached = Some(status);
        status
    }

    /// Evaluate the status at `now` without touching the cache.
    pub async fn status_at(&self, now: DateTime<Utc>) -> MarketStatus {
        match self.hours.phase_at(now) {
            SessionPhase::Weekend => MarketStatus::closed(MarketStatusReason::Weekend, now),
            SessionPhase::PreMarket => MarketStatus::closed(MarketStatusReason::PreMarket, now),
            SessionPhase::AfterHours => MarketStatus::closed(MarketStatusReason::AfterHours, now),
            SessionPhase::Trading => self.probe_session(now).await,
        }
    }

    async fn probe_session(&self, now: DateTime<Utc>) -> MarketStatus {
        let symbol = &self.hours.probe_symbol;
        match self.probe.last_trade_time(symbol).await {
            Ok(traded_at) => {
                let recency = chrono::Duration::from_std(self.hours.probe_recency)
                    .unwrap_or(chrono::Duration::zero());
                let same_session =
                    self.hours.local_date(traded_at) == self.hours.local_date(now);

                if same_session && now - traded_at <= recency {
                    MarketStatus::open(now)
                } else if self.hours.in_opening_grace(now) {
                    debug!(
                        "{} last traded {}, inside opening grace, assuming open",
                        symbol, traded_at
                    );
                    MarketStatus::open(now)
                } else {
                    debug!(
                        "{} last traded {}, treating session as a holiday",
                        symbol, traded_at
                    );
                    MarketStatus::closed(MarketStatusReason::Holiday, now)
                }
            }
            Err(e) => {
                // Fail open: a broken probe must not freeze prices all day.
                warn!("Market probe for {} failed: {}, assuming open", symbol, e);
                MarketStatus::open(now)
            }
        }
    }

    /// Drop the cached status so the next call re-evaluates.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MarketDataError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockProbe {
        result: Mutex<Option<DateTime<Utc>>>,
        calls: AtomicUsize,
    }

    impl MockProbe {
        fn returning(traded_at: Option<DateTime<Utc>>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(traded_at),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl IndexProbe for MockProbe {
        async fn last_trade_time(&self, symbol: &str) -> Result<DateTime<Utc>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (*self.result.lock().unwrap())
                .ok_or_else(|| MarketDataError::ProbeFailed(format!("{} unavailable", symbol)))
        }
    }

    fn ist(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2026, 10, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn calendar(probe: Arc<MockProbe>) -> MarketCalendar {
        MarketCalendar::new(TradingHours::default(), probe)
    }

    #[tokio::test]
    async fn test_weekend_never_probes() {
        let probe = MockProbe::returning(None);
        let cal = calendar(probe.clone());

        let status = cal.status_at(ist(17, 11, 0)).await;

        assert!(!status.is_open);
        assert_eq!(status.reason, MarketStatusReason::Weekend);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_outside_hours() {
        let cal = calendar(MockProbe::returning(None));
        assert_eq!(
            cal.status_at(ist(16, 8, 0)).await.reason,
            MarketStatusReason::PreMarket
        );
        assert_eq!(
            cal.status_at(ist(16, 15, 30)).await.reason,
            MarketStatusReason::AfterHours
        );
    }

    #[tokio::test]
    async fn test_recent_index_trade_means_open() {
        let now = ist(16, 11, 0);
        let cal = calendar(MockProbe::returning(Some(ist(16, 10, 58))));

        let status = cal.status_at(now).await;
        assert!(status.is_open);
        assert_eq!(status.reason, MarketStatusReason::Open);
    }

    #[tokio::test]
    async fn test_stale_index_trade_means_holiday() {
        // Last print is the previous session's close
        let cal = calendar(MockProbe::returning(Some(ist(15, 15, 29))));

        let status = cal.status_at(ist(16, 11, 0)).await;
        assert!(!status.is_open);
        assert_eq!(status.reason, MarketStatusReason::Holiday);
    }

    #[tokio::test]
    async fn test_stale_probe_inside_opening_grace_is_open() {
        let cal = calendar(MockProbe::returning(Some(ist(15, 15, 29))));

        let status = cal.status_at(ist(16, 9, 17)).await;
        assert!(status.is_open);
    }

    #[tokio::test]
    async fn test_probe_failure_fails_open() {
        let cal = calendar(MockProbe::returning(None));

        let status = cal.status_at(ist(16, 11, 0)).await;
        assert!(status.is_open);
        assert_eq!(status.reason, MarketStatusReason::Open);
    }

    #[tokio::test]
    async fn test_get_status_is_cached() {
        let cal = calendar(MockProbe::returning(Some(Utc::now())));

        let first = cal.get_status().await;
        let second = cal.get_status().await;
        assert_eq!(first, second);

        cal.invalidate().await;
        let third = cal.get_status().await;
        assert!(third.as_of >= first.as_of);
    }
}

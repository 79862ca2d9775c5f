//! When the background sync runs next.
//!
//! Planning is a pure function of the clock, the exchange hours, the market
//! status and what already ran, so it is re-evaluated after every run and
//! every sleep.

use chrono::{DateTime, NaiveDate, Utc};
use pricekeeper_market_data::{MarketStatus, MarketStatusReason, TradingHours};
use std::time::Duration;

use super::model::SyncTrigger;

/// Fallback sleep when the calendar cannot name a next wake-up.
const IDLE_RECHECK: Duration = Duration::from_secs(60 * 60);

/// Next step of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlan {
    Run(SyncTrigger),
    Sleep { until: DateTime<Utc> },
}

impl SyncPlan {
    /// How long to wait from `now`; zero for `Run`.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            SyncPlan::Run(_) => Duration::ZERO,
            SyncPlan::Sleep { until } => (*until - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

/// What the planner knows about past runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncHistory {
    /// Start of the latest market-hours run.
    pub last_market_hours_run: Option<DateTime<Utc>>,
    /// Exchange-local date of the latest post-close run.
    pub last_post_close_date: Option<NaiveDate>,
}

/// Decide the scheduler's next step.
///
/// `status` is only consulted inside the trading window.
pub fn plan_next_run(
    now: DateTime<Utc>,
    hours: &TradingHours,
    status: &MarketStatus,
    history: &SyncHistory,
    interval: Duration,
) -> SyncPlan {
    if hours.is_trading_window(now) {
        if status.is_open {
            let interval = chrono::Duration::from_std(interval)
                .unwrap_or_else(|_| chrono::Duration::minutes(15));
            return match history.last_market_hours_run {
                Some(last) if now - last < interval => SyncPlan::Sleep {
                    until: last + interval,
                },
                _ => SyncPlan::Run(SyncTrigger::MarketHours),
            };
        }
        if status.reason == MarketStatusReason::Holiday {
            return sleep_until(now, hours.next_post_close_start(now));
        }
        // Inconclusive status inside the window: look again shortly.
        return SyncPlan::Sleep {
            until: now + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero()),
        };
    }

    if hours.is_post_close_window(now) {
        let today = hours.local_date(now);
        if history.last_post_close_date != Some(today) {
            return SyncPlan::Run(SyncTrigger::PostClose);
        }
    }

    let next = [hours.next_open(now), hours.next_post_close_start(now)]
        .into_iter()
        .flatten()
        .min();
    sleep_until(now, next)
}

fn sleep_until(now: DateTime<Utc>, until: Option<DateTime<Utc>>) -> SyncPlan {
    let until = until.unwrap_or_else(|| {
        now + chrono::Duration::from_std(IDLE_RECHECK).unwrap_or(chrono::Duration::hours(1))
    });
    SyncPlan::Sleep { until }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Wall-clock time in Kolkata, as UTC. 2026-10-16 is a Friday.
    fn ist(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2026, 10, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn plan(now: DateTime<Utc>, status: MarketStatus, history: SyncHistory) -> SyncPlan {
        plan_next_run(
            now,
            &TradingHours::default(),
            &status,
            &history,
            Duration::from_secs(15 * 60),
        )
    }

    #[test]
    fn test_open_market_runs_when_interval_elapsed() {
        let now = ist(16, 11, 0);
        assert_eq!(
            plan(now, MarketStatus::open(now), SyncHistory::default()),
            SyncPlan::Run(SyncTrigger::MarketHours)
        );

        let history = SyncHistory {
            last_market_hours_run: Some(ist(16, 10, 40)),
            ..Default::default()
        };
        assert_eq!(
            plan(now, MarketStatus::open(now), history),
            SyncPlan::Run(SyncTrigger::MarketHours)
        );
    }

    #[test]
    fn test_open_market_sleeps_remaining_interval() {
        let now = ist(16, 11, 0);
        let history = SyncHistory {
            last_market_hours_run: Some(ist(16, 10, 50)),
            ..Default::default()
        };
        let next = plan(now, MarketStatus::open(now), history);
        assert_eq!(next, SyncPlan::Sleep { until: ist(16, 11, 5) });
        assert_eq!(next.delay_from(now), Duration::from_secs(5 * 60));
    }

    #[test]
    fn test_holiday_sleeps_until_post_close() {
        let now = ist(16, 11, 0);
        let status = MarketStatus::closed(MarketStatusReason::Holiday, now);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Sleep { until: ist(16, 16, 0) }
        );
    }

    #[test]
    fn test_post_close_runs_once_per_day() {
        let now = ist(16, 16, 5);
        let status = MarketStatus::closed(MarketStatusReason::AfterHours, now);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Run(SyncTrigger::PostClose)
        );

        let done_today = SyncHistory {
            last_post_close_date: Some(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()),
            ..Default::default()
        };
        // Friday after the post-close run: next wake-up is Monday's open.
        assert_eq!(
            plan(now, status, done_today),
            SyncPlan::Sleep { until: ist(19, 9, 15) }
        );

        let done_yesterday = SyncHistory {
            last_post_close_date: Some(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()),
            ..Default::default()
        };
        assert_eq!(
            plan(now, status, done_yesterday),
            SyncPlan::Run(SyncTrigger::PostClose)
        );
    }

    #[test]
    fn test_after_close_sleeps_until_post_close_window() {
        let now = ist(16, 15, 40);
        let status = MarketStatus::closed(MarketStatusReason::AfterHours, now);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Sleep { until: ist(16, 16, 0) }
        );
    }

    #[test]
    fn test_pre_market_sleeps_until_open() {
        let now = ist(16, 7, 0);
        let status = MarketStatus::closed(MarketStatusReason::PreMarket, now);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Sleep { until: ist(16, 9, 15) }
        );
    }

    #[test]
    fn test_weekend_sleeps_until_monday_open() {
        let now = ist(17, 12, 0);
        let status = MarketStatus::closed(MarketStatusReason::Weekend, now);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Sleep { until: ist(19, 9, 15) }
        );
        // Post-close window on a Saturday is not a sync window.
        let now = ist(17, 16, 5);
        assert_eq!(
            plan(now, status, SyncHistory::default()),
            SyncPlan::Sleep { until: ist(19, 9, 15) }
        );
    }
}

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::models::HOME_TIMEZONE;

/// Where the clock is relative to the exchange's regular session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Weekend,
    PreMarket,
    Trading,
    AfterHours,
}

/// Regular trading hours of the home exchange plus the probe settings used to
/// detect unscheduled holidays.
#[derive(Debug, Clone)]
pub struct TradingHours {
    pub exchange: String,
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// Start of the once-a-day post-close sync window.
    pub post_close_start: NaiveTime,
    pub post_close_end: NaiveTime,
    /// Reference index whose last trade proves the exchange is trading.
    pub probe_symbol: String,
    /// A probe trade older than this means the index is not trading.
    pub probe_recency: Duration,
    pub probe_timeout: Duration,
    /// How long a computed status is reused.
    pub status_ttl: Duration,
}

impl Default for TradingHours {
    fn default() -> Self {
        Self {
            exchange: "NSE".to_string(),
            timezone: HOME_TIMEZONE,
            open: hm(9, 15),
            close: hm(15, 30),
            post_close_start: hm(16, 0),
            post_close_end: hm(16, 15),
            probe_symbol: "^NSEI".to_string(),
            probe_recency: Duration::from_secs(15 * 60),
            probe_timeout: Duration::from_secs(5),
            status_ttl: Duration::from_secs(60),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

impl TradingHours {
    /// `now` in the exchange timezone.
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Calendar date of `now` at the exchange.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// Schedule-only phase; holidays are not known here.
    pub fn phase_at(&self, now: DateTime<Utc>) -> SessionPhase {
        let local = self.local(now);
        if is_weekend(local.date_naive()) {
            return SessionPhase::Weekend;
        }
        let time = local.time();
        if time < self.open {
            SessionPhase::PreMarket
        } else if time >= self.close {
            SessionPhase::AfterHours
        } else {
            SessionPhase::Trading
        }
    }

    pub fn is_trading_window(&self, now: DateTime<Utc>) -> bool {
        self.phase_at(now) == SessionPhase::Trading
    }

    /// Weekday between `post_close_start` (inclusive) and `post_close_end`.
    pub fn is_post_close_window(&self, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        let time = local.time();
        !is_weekend(local.date_naive())
            && time >= self.post_close_start
            && time < self.post_close_end
    }

    /// Date of the latest regular session that had opened by `now`.
    pub fn latest_session_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let local = self.local(now);
        let mut date = local.date_naive();
        if local.time() < self.open {
            date = date.pred_opt().unwrap_or(date);
        }
        while is_weekend(date) {
            match date.pred_opt() {
                Some(previous) => date = previous,
                None => break,
            }
        }
        date
    }

    /// True during the first `probe_recency` after the open, when a stale
    /// index print proves nothing yet.
    pub fn in_opening_grace(&self, now: DateTime<Utc>) -> bool {
        let time = self.local(now).time();
        let grace =
            chrono::Duration::from_std(self.probe_recency).unwrap_or(chrono::Duration::zero());
        time >= self.open && time < self.open + grace
    }

    /// `date` at `time` in the exchange timezone, as UTC.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// First weekday occurrence of `time` strictly after `now`.
    fn next_weekday_at(&self, now: DateTime<Utc>, time: NaiveTime) -> Option<DateTime<Utc>> {
        let today = self.local_date(now);
        (0..=7u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .filter(|date| !is_weekend(*date))
            .filter_map(|date| self.at(date, time))
            .find(|candidate| *candidate > now)
    }

    /// Next regular session open after `now`.
    pub fn next_open(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_weekday_at(now, self.open)
    }

    /// Next post-close window start after `now`.
    pub fn next_post_close_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_weekday_at(now, self.post_close_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wall-clock time in Kolkata, as UTC.
    fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_phases() {
        let hours = TradingHours::default();
        // 2026-10-16 is a Friday
        assert_eq!(hours.phase_at(ist(2026, 10, 16, 9, 0)), SessionPhase::PreMarket);
        assert_eq!(hours.phase_at(ist(2026, 10, 16, 9, 15)), SessionPhase::Trading);
        assert_eq!(hours.phase_at(ist(2026, 10, 16, 15, 29)), SessionPhase::Trading);
        assert_eq!(hours.phase_at(ist(2026, 10, 16, 15, 30)), SessionPhase::AfterHours);
        assert_eq!(hours.phase_at(ist(2026, 10, 17, 11, 0)), SessionPhase::Weekend);
    }

    #[test]
    fn test_post_close_window() {
        let hours = TradingHours::default();
        assert!(hours.is_post_close_window(ist(2026, 10, 16, 16, 0)));
        assert!(hours.is_post_close_window(ist(2026, 10, 16, 16, 14)));
        assert!(!hours.is_post_close_window(ist(2026, 10, 16, 16, 15)));
        assert!(!hours.is_post_close_window(ist(2026, 10, 17, 16, 5)));
    }

    #[test]
    fn test_latest_session_date() {
        let hours = TradingHours::default();
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(hours.latest_session_date(ist(2026, 10, 16, 12, 0)), friday);
        assert_eq!(hours.latest_session_date(ist(2026, 10, 16, 20, 0)), friday);
        assert_eq!(hours.latest_session_date(ist(2026, 10, 17, 11, 0)), friday);
        assert_eq!(hours.latest_session_date(ist(2026, 10, 18, 23, 0)), friday);
        // Monday before the open still shows Friday's session.
        assert_eq!(hours.latest_session_date(ist(2026, 10, 19, 8, 0)), friday);
        assert_eq!(
            hours.latest_session_date(ist(2026, 10, 19, 9, 15)),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }

    #[test]
    fn test_next_open_skips_weekend() {
        let hours = TradingHours::default();
        assert_eq!(
            hours.next_open(ist(2026, 10, 16, 18, 0)),
            Some(ist(2026, 10, 19, 9, 15))
        );
        assert_eq!(
            hours.next_open(ist(2026, 10, 19, 8, 0)),
            Some(ist(2026, 10, 19, 9, 15))
        );
    }

    #[test]
    fn test_next_post_close_start() {
        let hours = TradingHours::default();
        assert_eq!(
            hours.next_post_close_start(ist(2026, 10, 16, 12, 0)),
            Some(ist(2026, 10, 16, 16, 0))
        );
        assert_eq!(
            hours.next_post_close_start(ist(2026, 10, 16, 16, 5)),
            Some(ist(2026, 10, 19, 16, 0))
        );
    }

    #[test]
    fn test_opening_grace() {
        let hours = TradingHours::default();
        assert!(hours.in_opening_grace(ist(2026, 10, 16, 9, 20)));
        assert!(!hours.in_opening_grace(ist(2026, 10, 16, 9, 30)));
    }
}

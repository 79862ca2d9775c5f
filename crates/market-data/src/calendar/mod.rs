//! Market calendar detection for the home exchange.
//!
//! - `hours` - Trading hours, session phases and window arithmetic
//! - `probe` - Reference index probe used to spot unscheduled holidays
//! - `detector` - `MarketCalendar`, combining both behind a short-lived cache

mod detector;
mod hours;
mod probe;

pub use detector::MarketCalendar;
pub use hours::{SessionPhase, TradingHours};
pub use probe::{IndexProbe, YahooIndexProbe};

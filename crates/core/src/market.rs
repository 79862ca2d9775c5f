//! Seam between the pricing core and the market calendar.

use async_trait::async_trait;
use pricekeeper_market_data::{MarketCalendar, MarketStatus, TradingHours};

/// Where the price service and scheduler learn whether the market is open.
#[async_trait]
pub trait MarketStatusSource: Send + Sync {
    /// Current status; may be cached by the implementation.
    async fn current_status(&self) -> MarketStatus;

    fn trading_hours(&self) -> &TradingHours;
}

#[async_trait]
impl MarketStatusSource for MarketCalendar {
    async fn current_status(&self) -> MarketStatus {
        self.get_status().await
    }

    fn trading_hours(&self) -> &TradingHours {
        self.hours()
    }
}

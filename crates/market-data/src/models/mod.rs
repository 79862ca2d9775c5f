//! Market data models
//!
//! - `types` - Type aliases for common identifiers (ProviderId, Currency)
//! - `asset` - AssetKind, which selects the eligible providers
//! - `quote` - The normalized PriceQuote every adapter produces
//! - `market` - MarketStatus of the home exchange

mod asset;
mod market;
mod quote;
mod types;

pub use asset::AssetKind;
pub use market::{MarketStatus, MarketStatusReason};
pub use quote::{derive_change, PriceQuote};
pub use types::{Currency, ProviderId, HOME_CURRENCY, HOME_TIMEZONE};

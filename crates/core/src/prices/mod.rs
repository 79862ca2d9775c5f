//! Price cache, staleness policy and the request-path price service.

mod model;
pub mod policy;
mod service;
mod store;


pub use model::{
    CachedPriceEntry, PriceRequest, PriceResult, PriceType, PricedQuote, UnavailablePrice,
    UnavailableReason,
};
pub use policy::CacheDecision;
pub use service::{normalize_symbol, PriceService, PriceServiceTrait};
pub use store::PriceCacheStore;

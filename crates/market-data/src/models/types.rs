use std::borrow::Cow;

/// Provider identifier - mostly static constants ("YAHOO", "MFAPI", ...)
pub type ProviderId = Cow<'static, str>;

/// Currency code (ISO 4217) - mostly static
pub type Currency = Cow<'static, str>;

/// Currency assumed when a provider does not report one.
pub const HOME_CURRENCY: &str = "INR";

/// Timezone of the home exchange (NSE).
pub const HOME_TIMEZONE: chrono_tz::Tz = chrono_tz::Asia::Kolkata;

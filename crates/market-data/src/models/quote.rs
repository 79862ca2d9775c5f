use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

use super::types::ProviderId;

/// Normalized price quote produced by every provider adapter.
///
/// `change` and `change_percent` are always derived from `price` and
/// `previous_close`; adapters never supply them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Provider-facing symbol (exchange-qualified ticker, scheme code, ...)
    pub symbol: String,

    /// Last traded price or NAV. Always positive once validated.
    pub price: Decimal,

    /// Close of the session before `trading_date`, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// `price - previous_close`, or zero without a previous close.
    pub change: Decimal,

    /// `change / previous_close * 100`, or zero.
    pub change_percent: Decimal,

    /// Quote currency
    pub currency: String,

    /// Exchange session the quote belongs to.
    pub trading_date: NaiveDate,

    /// True only when `trading_date` is the current session.
    pub is_live_session: bool,

    /// Provider that produced the quote (YAHOO, MFAPI, ...)
    pub source: ProviderId,
}

impl PriceQuote {
    /// Create a quote, deriving `change` and `change_percent`.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        previous_close: Option<Decimal>,
        currency: impl Into<String>,
        trading_date: NaiveDate,
        is_live_session: bool,
        source: ProviderId,
    ) -> Self {
        let (change, change_percent) =
            derive_change(price, previous_close).unwrap_or((Decimal::ZERO, Decimal::ZERO));
        Self {
            symbol: symbol.into(),
            price,
            previous_close,
            change,
            change_percent,
            currency: currency.into(),
            trading_date,
            is_live_session,
            source,
        }
    }

    /// Reject quotes that cannot be served.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        if self.price <= Decimal::ZERO {
            return Err(MarketDataError::InvalidQuote {
                provider: self.source.to_string(),
                message: format!("price {} for {} is not positive", self.price, self.symbol),
            });
        }
        if derive_change(self.price, self.previous_close).is_none() {
            return Err(MarketDataError::InvalidQuote {
                provider: self.source.to_string(),
                message: format!(
                    "change for {} against previous close {:?} is out of range",
                    self.symbol, self.previous_close
                ),
            });
        }
        Ok(())
    }

    /// Re-tag the quote with the provider that produced it.
    pub fn with_source(mut self, source: ProviderId) -> Self {
        self.source = source;
        self
    }
}

/// Change and percent change against the previous close.
///
/// Returns `None` when the arithmetic overflows `Decimal`.
pub fn derive_change(
    price: Decimal,
    previous_close: Option<Decimal>,
) -> Option<(Decimal, Decimal)> {
    match previous_close {
        Some(prev) if prev > Decimal::ZERO => {
            let change = price.checked_sub(prev)?;
            let percent = change
                .checked_div(prev)?
                .checked_mul(Decimal::ONE_HUNDRED)?
                .round_dp(4);
            Some((change, percent))
        }
        Some(prev) => Some((price.checked_sub(prev)?, Decimal::ZERO)),
        None => Some((Decimal::ZERO, Decimal::ZERO)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::borrow::Cow;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_change_is_derived_from_previous_close() {
        let quote = PriceQuote::new(
            "ABC",
            dec!(100),
            Some(dec!(95)),
            "INR",
            date(),
            true,
            Cow::Borrowed("YAHOO"),
        );
        assert_eq!(quote.change, dec!(5));
        assert_eq!(quote.change_percent, dec!(5.2632));
    }

    #[test]
    fn test_change_is_zero_without_previous_close() {
        let quote = PriceQuote::new(
            "119551",
            dec!(45.12),
            None,
            "INR",
            date(),
            false,
            Cow::Borrowed("MFAPI"),
        );
        assert_eq!(quote.change, Decimal::ZERO);
        assert_eq!(quote.change_percent, Decimal::ZERO);
    }

    #[test]
    fn test_validate_rejects_non_positive_price() {
        let quote = PriceQuote::new(
            "ABC",
            dec!(0),
            Some(dec!(95)),
            "INR",
            date(),
            true,
            Cow::Borrowed("YAHOO"),
        );
        assert!(matches!(
            quote.validate(),
            Err(MarketDataError::InvalidQuote { .. })
        ));

        let negative = PriceQuote {
            price: dec!(-1),
            ..quote
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_overflowing_change_is_rejected_not_panicking() {
        let huge = dec!(70000000000000000000000000000);
        assert_eq!(derive_change(huge, Some(dec!(0.5))), None);

        let quote = PriceQuote::new(
            "ABC",
            huge,
            Some(dec!(0.5)),
            "INR",
            date(),
            true,
            Cow::Borrowed("YAHOO"),
        );
        assert_eq!(quote.change, Decimal::ZERO);
        assert!(matches!(
            quote.validate(),
            Err(MarketDataError::InvalidQuote { .. })
        ));
    }
}

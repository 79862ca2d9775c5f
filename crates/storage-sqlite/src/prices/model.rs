//! Database model for the price cache.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use pricekeeper_core::prices::CachedPriceEntry;

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_timestamp, DATE_FORMAT};

/// Database model for one cached price
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_cache)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceCacheDB {
    pub symbol: String,
    pub price: String,
    pub previous_close: Option<String>,
    pub change_amount: String,
    pub change_percent: String,
    pub currency: String,
    pub price_date: String,
    pub source: String,
    pub fetched_at: String,
}

impl From<&CachedPriceEntry> for PriceCacheDB {
    fn from(entry: &CachedPriceEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            price: entry.price.to_string(),
            previous_close: entry.previous_close.map(|p| p.to_string()),
            change_amount: entry.change_amount.to_string(),
            change_percent: entry.change_percent.to_string(),
            currency: entry.currency.clone(),
            price_date: entry.price_date.format(DATE_FORMAT).to_string(),
            source: entry.source.clone(),
            fetched_at: format_timestamp(entry.fetched_at),
        }
    }
}

impl TryFrom<PriceCacheDB> for CachedPriceEntry {
    type Error = StorageError;

    fn try_from(db: PriceCacheDB) -> Result<Self, Self::Error> {
        let decimal = |field: &str, value: &str| -> Result<Decimal, StorageError> {
            Decimal::from_str(value).map_err(|e| {
                StorageError::CorruptRow(format!("{} of {}: {}", field, db.symbol, e))
            })
        };

        let price_date = NaiveDate::parse_from_str(&db.price_date, DATE_FORMAT).map_err(|e| {
            StorageError::CorruptRow(format!("price_date of {}: {}", db.symbol, e))
        })?;
        let fetched_at: DateTime<Utc> = parse_timestamp(&db.fetched_at).map_err(|e| {
            StorageError::CorruptRow(format!("fetched_at of {}: {}", db.symbol, e))
        })?;

        Ok(CachedPriceEntry {
            price: decimal("price", &db.price)?,
            previous_close: db
                .previous_close
                .as_deref()
                .map(|p| decimal("previous_close", p))
                .transpose()?,
            change_amount: decimal("change_amount", &db.change_amount)?,
            change_percent: decimal("change_percent", &db.change_percent)?,
            price_date,
            fetched_at,
            symbol: db.symbol,
            currency: db.currency,
            source: db.source,
        })
    }
}

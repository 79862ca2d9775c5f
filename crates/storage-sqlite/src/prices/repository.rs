use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use pricekeeper_core::prices::{CachedPriceEntry, PriceCacheStore};
use pricekeeper_core::Result;
use pricekeeper_market_data::PriceQuote;

use super::model::PriceCacheDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::price_cache::dsl as price_cache_dsl;
use crate::utils::SQLITE_IN_CHUNK;

pub struct PriceCacheRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PriceCacheRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Upsert `entry` unless the stored row was fetched later. Returns the
    /// entry that is cached afterwards.
    async fn upsert_entry(&self, entry: CachedPriceEntry) -> Result<CachedPriceEntry> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<CachedPriceEntry> {
                let stored = price_cache_dsl::price_cache
                    .find(entry.symbol.as_str())
                    .select(PriceCacheDB::as_select())
                    .first::<PriceCacheDB>(conn)
                    .optional()
                    .map_err(StorageError::QueryFailed)?
                    .map(to_entry)
                    .transpose()?;

                if let Some(stored) = stored {
                    if stored.fetched_at > entry.fetched_at {
                        debug!(
                            "Keeping newer cached price for {} from {}",
                            stored.symbol, stored.fetched_at
                        );
                        return Ok(stored);
                    }
                }

                diesel::replace_into(price_cache_dsl::price_cache)
                    .values(&PriceCacheDB::from(&entry))
                    .execute(conn)
                    .map_err(StorageError::QueryFailed)?;
                Ok(entry)
            })
            .await
    }
}

fn to_entry(row: PriceCacheDB) -> Result<CachedPriceEntry> {
    CachedPriceEntry::try_from(row).map_err(Into::into)
}

#[async_trait]
impl PriceCacheStore for PriceCacheRepository {
    fn get(&self, symbol: &str) -> Result<Option<CachedPriceEntry>> {
        let mut conn = get_connection(&self.pool)?;

        price_cache_dsl::price_cache
            .find(symbol)
            .select(PriceCacheDB::as_select())
            .first::<PriceCacheDB>(&mut conn)
            .optional()
            .into_core()?
            .map(to_entry)
            .transpose()
    }

    fn get_bulk(&self, symbols: &[String]) -> Result<HashMap<String, CachedPriceEntry>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = get_connection(&self.pool)?;

        let mut entries = HashMap::with_capacity(symbols.len());
        for chunk in symbols.chunks(SQLITE_IN_CHUNK) {
            let rows = price_cache_dsl::price_cache
                .filter(price_cache_dsl::symbol.eq_any(chunk))
                .select(PriceCacheDB::as_select())
                .load::<PriceCacheDB>(&mut conn)
                .into_core()?;
            for row in rows {
                let entry = to_entry(row)?;
                entries.insert(entry.symbol.clone(), entry);
            }
        }
        Ok(entries)
    }

    async fn put(
        &self,
        symbol: &str,
        quote: &PriceQuote,
        source: &str,
    ) -> Result<CachedPriceEntry> {
        // Stored timestamps carry microseconds; keep the returned entry identical.
        let fetched_at = Utc::now().trunc_subsecs(6);
        let entry = CachedPriceEntry::from_quote(symbol, quote, source, fetched_at);
        self.upsert_entry(entry).await
    }

    async fn clear(&self) -> Result<usize> {
        self.writer
            .exec(|conn: &mut SqliteConnection| -> Result<usize> {
                diesel::delete(price_cache_dsl::price_cache)
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    fn count(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = price_cache_dsl::price_cache
            .count()
            .get_result(&mut conn)
            .into_core()?;
        Ok(count as usize)
    }
}

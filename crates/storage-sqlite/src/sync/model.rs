//! Database models for sync jobs and symbol priorities.

use diesel::prelude::*;

use pricekeeper_core::sync::{SymbolPriority, SyncJobRecord, SyncJobStatus, SyncTrigger};
use pricekeeper_market_data::AssetKind;

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_timestamp};

/// Database model for a sync job
#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_sync_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncJobDB {
    pub id: String,
    pub status: String,
    pub trigger: String,
    pub symbols_total: i32,
    pub symbols_fetched: i32,
    pub symbols_failed: i32,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

impl From<&SyncJobRecord> for SyncJobDB {
    fn from(job: &SyncJobRecord) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status.as_str().to_string(),
            trigger: job.trigger.as_str().to_string(),
            symbols_total: job.symbols_total,
            symbols_fetched: job.symbols_fetched,
            symbols_failed: job.symbols_failed,
            started_at: format_timestamp(job.started_at),
            completed_at: job.completed_at.map(format_timestamp),
            error_message: job.error_message.clone(),
        }
    }
}

impl TryFrom<SyncJobDB> for SyncJobRecord {
    type Error = StorageError;

    fn try_from(db: SyncJobDB) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| StorageError::CorruptRow(format!("{} of sync job {}", what, db.id));

        let status = SyncJobStatus::parse(&db.status).ok_or_else(|| corrupt("status"))?;
        let trigger = SyncTrigger::parse(&db.trigger).ok_or_else(|| corrupt("trigger"))?;
        let started_at = parse_timestamp(&db.started_at).map_err(|_| corrupt("started_at"))?;
        let completed_at = db
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|_| corrupt("completed_at"))?;

        Ok(SyncJobRecord {
            id: db.id,
            status,
            trigger,
            symbols_total: db.symbols_total,
            symbols_fetched: db.symbols_fetched,
            symbols_failed: db.symbols_failed,
            started_at,
            completed_at,
            error_message: db.error_message,
        })
    }
}

/// Database model for a symbol's sync ranking
#[derive(Queryable, Identifiable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::symbol_priority)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SymbolPriorityDB {
    pub symbol: String,
    pub asset_kind: String,
    pub priority: i32,
    pub request_count: i64,
    pub last_requested_at: Option<String>,
}

impl TryFrom<SymbolPriorityDB> for SymbolPriority {
    type Error = StorageError;

    fn try_from(db: SymbolPriorityDB) -> Result<Self, Self::Error> {
        let asset_kind = db
            .asset_kind
            .parse::<AssetKind>()
            .map_err(|e| StorageError::CorruptRow(format!("asset_kind of {}: {}", db.symbol, e)))?;
        let last_requested_at = db
            .last_requested_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| {
                StorageError::CorruptRow(format!("last_requested_at of {}: {}", db.symbol, e))
            })?;

        Ok(SymbolPriority {
            symbol: db.symbol,
            asset_kind,
            priority: db.priority,
            request_count: db.request_count,
            last_requested_at,
        })
    }
}

//! Storage traits for sync jobs and symbol priorities.

use async_trait::async_trait;
use pricekeeper_market_data::AssetKind;

use super::model::{SymbolPriority, SyncJobRecord, SyncJobStatus, SyncProgress, SyncTrigger};
use crate::errors::Result;

/// Append-only log of sync jobs.
#[async_trait]
pub trait SyncJobStore: Send + Sync {
    /// Persist a freshly started job.
    async fn create_job(&self, job: &SyncJobRecord) -> Result<()>;

    /// Flush counters of a running job.
    async fn update_progress(&self, job_id: &str, progress: SyncProgress) -> Result<()>;

    /// Mark a job finished with its final counters.
    async fn complete_job(
        &self,
        job_id: &str,
        status: SyncJobStatus,
        progress: SyncProgress,
        error_message: Option<String>,
    ) -> Result<()>;

    /// Most recent jobs, newest first.
    fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJobRecord>>;

    /// Most recent job started by `trigger`.
    fn latest_by_trigger(&self, trigger: SyncTrigger) -> Result<Option<SyncJobRecord>>;

    /// Mark jobs left `Running` by a previous process as failed.
    /// Returns the number of jobs touched.
    async fn fail_running_jobs(&self, message: &str) -> Result<usize>;
}

/// Which symbols the scheduler refreshes, in what order.
#[async_trait]
pub trait SymbolPriorityStore: Send + Sync {
    /// Count a live request for `symbol`, creating the row if needed.
    async fn record_request(&self, symbol: &str, asset_kind: AssetKind) -> Result<()>;

    /// Register (or re-rank) a held symbol.
    async fn register_symbol(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        priority: i32,
    ) -> Result<SymbolPriority>;

    /// Up to `limit` symbols ordered by priority, then request count, both descending.
    fn top_symbols(&self, limit: i64) -> Result<Vec<SymbolPriority>>;

    fn get(&self, symbol: &str) -> Result<Option<SymbolPriority>>;
}

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use pricekeeper_core::sync::{
    SymbolPriority, SymbolPriorityStore, SyncJobRecord, SyncJobStatus, SyncJobStore,
    SyncProgress, SyncTrigger,
};
use pricekeeper_core::Result;
use pricekeeper_market_data::AssetKind;

use super::model::{SymbolPriorityDB, SyncJobDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::price_sync_jobs::dsl as jobs_dsl;
use crate::schema::symbol_priority::dsl as priority_dsl;
use crate::utils::format_timestamp;

pub struct SyncJobRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncJobRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncJobStore for SyncJobRepository {
    async fn create_job(&self, job: &SyncJobRecord) -> Result<()> {
        let row = SyncJobDB::from(job);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(jobs_dsl::price_sync_jobs)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    async fn update_progress(&self, job_id: &str, progress: SyncProgress) -> Result<()> {
        let job_id = job_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(jobs_dsl::price_sync_jobs.find(job_id.as_str()))
                    .set((
                        jobs_dsl::symbols_fetched.eq(progress.fetched as i32),
                        jobs_dsl::symbols_failed.eq(progress.failed as i32),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    async fn complete_job(
        &self,
        job_id: &str,
        status: SyncJobStatus,
        progress: SyncProgress,
        error_message: Option<String>,
    ) -> Result<()> {
        let job_id = job_id.to_string();
        let completed_at = format_timestamp(Utc::now());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(jobs_dsl::price_sync_jobs.find(job_id.as_str()))
                    .set((
                        jobs_dsl::status.eq(status.as_str()),
                        jobs_dsl::symbols_fetched.eq(progress.fetched as i32),
                        jobs_dsl::symbols_failed.eq(progress.failed as i32),
                        jobs_dsl::completed_at.eq(Some(completed_at)),
                        jobs_dsl::error_message.eq(error_message),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJobRecord>> {
        let mut conn = get_connection(&self.pool)?;
        jobs_dsl::price_sync_jobs
            .order(jobs_dsl::started_at.desc())
            .limit(limit)
            .select(SyncJobDB::as_select())
            .load::<SyncJobDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(|row| SyncJobRecord::try_from(row).map_err(Into::into))
            .collect()
    }

    fn latest_by_trigger(&self, trigger: SyncTrigger) -> Result<Option<SyncJobRecord>> {
        let mut conn = get_connection(&self.pool)?;
        jobs_dsl::price_sync_jobs
            .filter(jobs_dsl::trigger.eq(trigger.as_str()))
            .order(jobs_dsl::started_at.desc())
            .select(SyncJobDB::as_select())
            .first::<SyncJobDB>(&mut conn)
            .optional()
            .into_core()?
            .map(|row| SyncJobRecord::try_from(row).map_err(Into::into))
            .transpose()
    }

    async fn fail_running_jobs(&self, message: &str) -> Result<usize> {
        let message = message.to_string();
        let completed_at = format_timestamp(Utc::now());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                diesel::update(
                    jobs_dsl::price_sync_jobs
                        .filter(jobs_dsl::status.eq(SyncJobStatus::Running.as_str())),
                )
                .set((
                    jobs_dsl::status.eq(SyncJobStatus::Failed.as_str()),
                    jobs_dsl::completed_at.eq(Some(completed_at)),
                    jobs_dsl::error_message.eq(Some(message)),
                ))
                .execute(conn)
                .into_core()
            })
            .await
    }
}

pub struct SymbolPriorityRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SymbolPriorityRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SymbolPriorityStore for SymbolPriorityRepository {
    async fn record_request(&self, symbol: &str, asset_kind: AssetKind) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let row = SymbolPriorityDB {
            symbol: symbol.to_string(),
            asset_kind: asset_kind.as_str().to_string(),
            priority: 0,
            request_count: 1,
            last_requested_at: Some(now.clone()),
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(priority_dsl::symbol_priority)
                    .values(&row)
                    .on_conflict(priority_dsl::symbol)
                    .do_update()
                    .set((
                        priority_dsl::request_count.eq(priority_dsl::request_count + 1),
                        priority_dsl::last_requested_at.eq(Some(now)),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    async fn register_symbol(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        priority: i32,
    ) -> Result<SymbolPriority> {
        let row = SymbolPriorityDB {
            symbol: symbol.to_string(),
            asset_kind: asset_kind.as_str().to_string(),
            priority,
            request_count: 0,
            last_requested_at: None,
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SymbolPriority> {
                diesel::insert_into(priority_dsl::symbol_priority)
                    .values(&row)
                    .on_conflict(priority_dsl::symbol)
                    .do_update()
                    .set((
                        priority_dsl::asset_kind.eq(row.asset_kind.as_str()),
                        priority_dsl::priority.eq(row.priority),
                    ))
                    .execute(conn)
                    .into_core()?;

                let stored = priority_dsl::symbol_priority
                    .find(row.symbol.as_str())
                    .select(SymbolPriorityDB::as_select())
                    .first::<SymbolPriorityDB>(conn)
                    .into_core()?;
                Ok(SymbolPriority::try_from(stored)?)
            })
            .await
    }

    fn top_symbols(&self, limit: i64) -> Result<Vec<SymbolPriority>> {
        let mut conn = get_connection(&self.pool)?;
        priority_dsl::symbol_priority
            .order((
                priority_dsl::priority.desc(),
                priority_dsl::request_count.desc(),
                priority_dsl::symbol.asc(),
            ))
            .limit(limit)
            .select(SymbolPriorityDB::as_select())
            .load::<SymbolPriorityDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(|row| SymbolPriority::try_from(row).map_err(Into::into))
            .collect()
    }

    fn get(&self, symbol: &str) -> Result<Option<SymbolPriority>> {
        let mut conn = get_connection(&self.pool)?;
        priority_dsl::symbol_priority
            .find(symbol)
            .select(SymbolPriorityDB::as_select())
            .first::<SymbolPriorityDB>(&mut conn)
            .optional()
            .into_core()?
            .map(|row| SymbolPriority::try_from(row).map_err(Into::into))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDb;
    use chrono::Duration;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let db = TestDb::new();
        let repo = SyncJobRepository::new(db.pool.clone(), db.writer());

        let job = SyncJobRecord::start(SyncTrigger::MarketHours, 3);
        repo.create_job(&job).await.unwrap();
        repo.update_progress(&job.id, SyncProgress { fetched: 1, failed: 1 })
            .await
            .unwrap();

        let running = repo.latest_by_trigger(SyncTrigger::MarketHours).unwrap().unwrap();
        assert_eq!(running.id, job.id);
        assert!(running.is_running());
        assert_eq!(running.symbols_fetched, 1);
        assert_eq!(running.symbols_failed, 1);

        repo.complete_job(
            &job.id,
            SyncJobStatus::Completed,
            SyncProgress { fetched: 2, failed: 1 },
            None,
        )
        .await
        .unwrap();

        let done = repo.recent_jobs(10).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status, SyncJobStatus::Completed);
        assert_eq!(done[0].symbols_total, 3);
        assert_eq!(done[0].symbols_fetched, 2);
        assert!(done[0].completed_at.is_some());
        assert!(repo.latest_by_trigger(SyncTrigger::PostClose).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_jobs_newest_first() {
        let db = TestDb::new();
        let repo = SyncJobRepository::new(db.pool.clone(), db.writer());

        let mut older = SyncJobRecord::start(SyncTrigger::PostClose, 1);
        older.started_at = older.started_at - Duration::hours(2);
        let newer = SyncJobRecord::start(SyncTrigger::Manual, 1);
        repo.create_job(&newer).await.unwrap();
        repo.create_job(&older).await.unwrap();

        let jobs = repo.recent_jobs(10).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, newer.id);
        assert_eq!(jobs[1].id, older.id);
        assert_eq!(repo.recent_jobs(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_running_jobs_only_touches_running() {
        let db = TestDb::new();
        let repo = SyncJobRepository::new(db.pool.clone(), db.writer());

        let stale = SyncJobRecord::start(SyncTrigger::MarketHours, 5);
        let finished = SyncJobRecord::start(SyncTrigger::Manual, 1);
        repo.create_job(&stale).await.unwrap();
        repo.create_job(&finished).await.unwrap();
        repo.complete_job(
            &finished.id,
            SyncJobStatus::Completed,
            SyncProgress { fetched: 1, failed: 0 },
            None,
        )
        .await
        .unwrap();

        assert_eq!(repo.fail_running_jobs("Interrupted").await.unwrap(), 1);

        let stale = repo.latest_by_trigger(SyncTrigger::MarketHours).unwrap().unwrap();
        assert_eq!(stale.status, SyncJobStatus::Failed);
        assert_eq!(stale.error_message.as_deref(), Some("Interrupted"));
        let finished = repo.latest_by_trigger(SyncTrigger::Manual).unwrap().unwrap();
        assert_eq!(finished.status, SyncJobStatus::Completed);
        assert_eq!(repo.fail_running_jobs("Interrupted").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_request_counts_up() {
        let db = TestDb::new();
        let repo = SymbolPriorityRepository::new(db.pool.clone(), db.writer());

        repo.record_request("TCS.NS", AssetKind::Equity).await.unwrap();
        repo.record_request("TCS.NS", AssetKind::Equity).await.unwrap();

        let row = repo.get("TCS.NS").unwrap().unwrap();
        assert_eq!(row.request_count, 2);
        assert_eq!(row.priority, 0);
        assert!(row.last_requested_at.is_some());
        assert!(repo.get("INFY.NS").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_keeps_request_count() {
        let db = TestDb::new();
        let repo = SymbolPriorityRepository::new(db.pool.clone(), db.writer());

        repo.record_request("119551", AssetKind::Equity).await.unwrap();
        let registered = repo
            .register_symbol("119551", AssetKind::MutualFund, 10)
            .await
            .unwrap();

        assert_eq!(registered.priority, 10);
        assert_eq!(registered.asset_kind, AssetKind::MutualFund);
        assert_eq!(registered.request_count, 1);
    }

    #[tokio::test]
    async fn test_top_symbols_ordering() {
        let db = TestDb::new();
        let repo = SymbolPriorityRepository::new(db.pool.clone(), db.writer());

        repo.register_symbol("HELD.NS", AssetKind::Equity, 5).await.unwrap();
        for _ in 0..3 {
            repo.record_request("POPULAR.NS", AssetKind::Equity).await.unwrap();
        }
        repo.record_request("BBB.NS", AssetKind::Equity).await.unwrap();
        repo.record_request("AAA.NS", AssetKind::Equity).await.unwrap();

        let top: Vec<String> = repo
            .top_symbols(10)
            .unwrap()
            .into_iter()
            .map(|p| p.symbol)
            .collect();
        assert_eq!(top, vec!["HELD.NS", "POPULAR.NS", "AAA.NS", "BBB.NS"]);
        assert_eq!(repo.top_symbols(2).unwrap().len(), 2);
    }
}

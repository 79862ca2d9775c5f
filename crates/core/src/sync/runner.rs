//! One sync run: select symbols, refresh them through the provider chain and
//! write the results through the price cache.

use futures::future::join_all;
use log::{debug, error, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pricekeeper_market_data::{FallbackChain, MarketDataError};

use super::model::{
    ManualSyncResult, SymbolPriority, SyncJobRecord, SyncJobStatus, SyncProgress, SyncTrigger,
};
use super::store::{SymbolPriorityStore, SyncJobStore};
use crate::config::SchedulerConfig;
use crate::constants::SYNC_CANCELLED;
use crate::errors::{Error, Result};
use crate::prices::PriceCacheStore;

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when there was nothing to sync and no job was recorded.
    pub job_id: Option<String>,
    pub trigger: SyncTrigger,
    pub total: usize,
    pub progress: SyncProgress,
    /// The time budget ran out before every symbol was tried.
    pub partial: bool,
    pub cancelled: bool,
}

impl RunOutcome {
    fn empty(trigger: SyncTrigger) -> Self {
        Self {
            job_id: None,
            trigger,
            total: 0,
            progress: SyncProgress::default(),
            partial: false,
            cancelled: false,
        }
    }

    pub fn to_manual_result(&self) -> ManualSyncResult {
        let message = if self.total == 0 {
            "No symbols to sync".to_string()
        } else if self.cancelled {
            SYNC_CANCELLED.to_string()
        } else if self.partial {
            format!(
                "Synced {} of {} symbols before the time budget ran out",
                self.progress.fetched, self.total
            )
        } else {
            format!("Synced {} of {} symbols", self.progress.fetched, self.total)
        };
        ManualSyncResult {
            success: !self.cancelled,
            message,
            fetched: self.progress.fetched,
            failed: self.progress.failed,
            total: self.total,
            partial: self.partial,
        }
    }
}

pub struct SyncRunner {
    chain: Arc<FallbackChain>,
    cache: Arc<dyn PriceCacheStore>,
    priorities: Arc<dyn SymbolPriorityStore>,
    jobs: Arc<dyn SyncJobStore>,
    config: SchedulerConfig,
}

impl SyncRunner {
    pub fn new(
        chain: Arc<FallbackChain>,
        cache: Arc<dyn PriceCacheStore>,
        priorities: Arc<dyn SymbolPriorityStore>,
        jobs: Arc<dyn SyncJobStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            chain,
            cache,
            priorities,
            jobs,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn select_symbols(&self) -> Result<Vec<SymbolPriority>> {
        self.priorities
            .top_symbols(self.config.max_symbols_per_sync as i64)
    }

    async fn begin_job(&self, trigger: SyncTrigger, total: usize) -> Result<SyncJobRecord> {
        let job = SyncJobRecord::start(trigger, total);
        self.jobs.create_job(&job).await?;
        info!(
            "Sync job {} started ({:?}, {} symbols)",
            job.id, trigger, total
        );
        Ok(job)
    }

    /// Leave a failed job behind for a run that errored before any symbol
    /// was tried.
    async fn record_failed_run(&self, trigger: SyncTrigger, cause: &Error) {
        let job = SyncJobRecord::start(trigger, 0);
        if let Err(e) = self.jobs.create_job(&job).await {
            error!("Failed to record failed {:?} sync: {}", trigger, e);
            return;
        }
        if let Err(e) = self
            .jobs
            .complete_job(
                &job.id,
                SyncJobStatus::Failed,
                SyncProgress::default(),
                Some(cause.to_string()),
            )
            .await
        {
            error!("Failed to complete sync job {}: {}", job.id, e);
        }
        warn!("Sync job {} failed before starting: {}", job.id, cause);
    }

    /// Symbols for this run; a selection error is recorded as a failed job.
    async fn select_for_run(&self, trigger: SyncTrigger) -> Result<Vec<SymbolPriority>> {
        match self.select_symbols() {
            Ok(symbols) => Ok(symbols),
            Err(e) => {
                self.record_failed_run(trigger, &e).await;
                Err(e)
            }
        }
    }

    async fn flush_progress(&self, job_id: &str, progress: SyncProgress) {
        if let Err(e) = self.jobs.update_progress(job_id, progress).await {
            warn!("Failed to flush progress for sync job {}: {}", job_id, e);
        }
    }

    async fn finish_job(&self, outcome: &RunOutcome) {
        let Some(job_id) = outcome.job_id.as_deref() else {
            return;
        };
        let (status, message) = if outcome.cancelled {
            (SyncJobStatus::Failed, Some(SYNC_CANCELLED.to_string()))
        } else {
            (SyncJobStatus::Completed, None)
        };
        if let Err(e) = self
            .jobs
            .complete_job(job_id, status, outcome.progress, message)
            .await
        {
            error!("Failed to complete sync job {}: {}", job_id, e);
        }
        info!(
            "Sync job {} finished as {}: {} fetched, {} failed of {}{}",
            job_id,
            status.as_str(),
            outcome.progress.fetched,
            outcome.progress.failed,
            outcome.total,
            if outcome.partial { " (partial)" } else { "" }
        );
    }

    /// Refresh one symbol and write it through the cache.
    async fn sync_symbol(&self, symbol: &SymbolPriority, deadline: Option<Instant>) -> Result<()> {
        let quote = match deadline {
            Some(deadline) => {
                self.chain
                    .fetch_price_until(&symbol.symbol, symbol.asset_kind, deadline)
                    .await?
            }
            None => {
                self.chain
                    .fetch_price(&symbol.symbol, symbol.asset_kind)
                    .await?
            }
        };
        let source = quote.source.to_string();
        self.cache.put(&symbol.symbol, &quote, &source).await?;
        debug!("Synced {} at {} via {}", symbol.symbol, quote.price, source);
        Ok(())
    }

    fn paced_delay(&self) -> Duration {
        let max_jitter = self.config.jitter_max_ms;
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter)
        };
        self.config.symbol_delay() + Duration::from_millis(jitter)
    }

    /// Background run: one symbol at a time with a jittered pause in between.
    ///
    /// Cancellation is honoured at every symbol boundary; a cancelled run is
    /// recorded as failed.
    pub async fn run_sequential(
        &self,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let symbols = self.select_for_run(trigger).await?;
        if symbols.is_empty() {
            debug!("No symbols to sync");
            return Ok(RunOutcome::empty(trigger));
        }

        let job = self.begin_job(trigger, symbols.len()).await?;
        let mut outcome = RunOutcome {
            job_id: Some(job.id.clone()),
            trigger,
            total: symbols.len(),
            progress: SyncProgress::default(),
            partial: false,
            cancelled: false,
        };

        for (index, symbol) in symbols.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.paced_delay()) => {}
                }
            }

            match self.sync_symbol(symbol, None).await {
                Ok(()) => outcome.progress.fetched += 1,
                Err(e) => {
                    warn!("Sync failed for {}: {}", symbol.symbol, e);
                    outcome.progress.failed += 1;
                }
            }

            if outcome.progress.processed() % self.config.progress_flush_every.max(1) == 0 {
                self.flush_progress(&job.id, outcome.progress).await;
            }
        }

        self.finish_job(&outcome).await;
        Ok(outcome)
    }

    /// Manual run: concurrent batches under an overall time budget.
    ///
    /// When the budget runs out the remaining symbols are left alone and the
    /// outcome is marked partial.
    pub async fn run_fast(
        &self,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let symbols = self.select_for_run(trigger).await?;
        if symbols.is_empty() {
            return Ok(RunOutcome::empty(trigger));
        }

        let deadline = Instant::now() + self.config.fast_budget();
        let job = self.begin_job(trigger, symbols.len()).await?;
        let mut outcome = RunOutcome {
            job_id: Some(job.id.clone()),
            trigger,
            total: symbols.len(),
            progress: SyncProgress::default(),
            partial: false,
            cancelled: false,
        };

        for (index, batch) in symbols
            .chunks(self.config.fast_batch_size.max(1))
            .enumerate()
        {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep_until(
                        (Instant::now() + self.config.fast_batch_delay()).min(deadline)
                    ) => {}
                }
            }
            if Instant::now() >= deadline {
                break;
            }

            let results = join_all(
                batch
                    .iter()
                    .map(|symbol| self.sync_symbol(symbol, Some(deadline))),
            )
            .await;

            for (symbol, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => outcome.progress.fetched += 1,
                    Err(Error::MarketData(MarketDataError::DeadlineExceeded { .. })) => {
                        debug!("Time budget ran out while syncing {}", symbol.symbol);
                    }
                    Err(e) => {
                        warn!("Sync failed for {}: {}", symbol.symbol, e);
                        outcome.progress.failed += 1;
                    }
                }
            }
            self.flush_progress(&job.id, outcome.progress).await;
        }

        outcome.partial = !outcome.cancelled && outcome.progress.processed() < outcome.total;
        if outcome.partial {
            warn!(
                "Fast sync budget of {:?} exhausted after {} of {} symbols",
                self.config.fast_budget(),
                outcome.progress.processed(),
                outcome.total
            );
        }

        self.finish_job(&outcome).await;
        Ok(outcome)
    }
}

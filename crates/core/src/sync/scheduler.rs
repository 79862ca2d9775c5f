//! Background price sync scheduler.
//!
//! Owns one long-lived task that plans, sleeps and runs sync jobs, plus the
//! run-state lock shared with manual syncs so that at most one run is active.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::model::{ManualSyncResult, SyncJobStatus, SyncStatusReport, SyncTrigger};
use super::runner::SyncRunner;
use super::schedule::{plan_next_run, SyncHistory, SyncPlan};
use super::store::SyncJobStore;
use crate::constants::{RECENT_JOBS_LIMIT, SYNC_ALREADY_RUNNING};
use crate::errors::Result;
use crate::market::MarketStatusSource;

/// Pause before re-planning when a due run collides with a manual one.
const BUSY_RETRY: Duration = Duration::from_secs(30);

/// Pause before re-planning after a post-close run that did not complete.
const FAILED_RUN_RETRY: Duration = Duration::from_secs(2 * 60);

/// Wall clock the loop plans against.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running {
        trigger: SyncTrigger,
        started_at: DateTime<Utc>,
    },
}

/// Returns the run state to `Idle` when dropped.
pub struct RunGuard {
    state: Arc<Mutex<RunState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *lock(&self.state) = RunState::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Sync scheduler lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

pub struct PriceSyncScheduler {
    runner: Arc<SyncRunner>,
    market: Arc<dyn MarketStatusSource>,
    jobs: Arc<dyn SyncJobStore>,
    run_state: Arc<Mutex<RunState>>,
    cancel: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
    clock: Clock,
}

impl PriceSyncScheduler {
    pub fn new(
        runner: Arc<SyncRunner>,
        market: Arc<dyn MarketStatusSource>,
        jobs: Arc<dyn SyncJobStore>,
    ) -> Self {
        Self {
            runner,
            market,
            jobs,
            run_state: Arc::new(Mutex::new(RunState::Idle)),
            cancel: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn run_state(&self) -> RunState {
        *lock(&self.run_state)
    }

    /// Claim the run slot, or `None` when a run is already active.
    pub fn try_begin(&self, trigger: SyncTrigger) -> Option<RunGuard> {
        try_begin(&self.run_state, trigger)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the scheduler loop. A second call while it runs is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.is_active() {
            warn!("Price sync scheduler already running");
            return Ok(());
        }

        let interrupted = self
            .jobs
            .fail_running_jobs("Interrupted before completion")
            .await?;
        if interrupted > 0 {
            info!("Marked {} interrupted sync jobs as failed", interrupted);
        }

        let history = self.load_history()?;
        let cancel = lock(&self.cancel).clone();
        let worker = SchedulerLoop {
            runner: self.runner.clone(),
            market: self.market.clone(),
            jobs: self.jobs.clone(),
            run_state: self.run_state.clone(),
            cancel,
            clock: self.clock.clone(),
            history,
        };
        let handle = tokio::spawn(worker.run());
        *lock(&self.handle) = Some(handle);
        info!("Price sync scheduler started");
        Ok(())
    }

    /// Cancel the loop and wait for it to exit. An in-flight run stops at the
    /// next symbol boundary.
    pub async fn stop(&self) {
        let cancel = std::mem::replace(&mut *lock(&self.cancel), CancellationToken::new());
        cancel.cancel();

        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Price sync scheduler task ended abnormally: {}", e);
            }
            info!("Price sync scheduler stopped");
        }
    }

    /// Run a fast sync now, unless any run is already in progress.
    pub async fn trigger_manual_sync(&self) -> Result<ManualSyncResult> {
        let Some(_guard) = self.try_begin(SyncTrigger::Manual) else {
            info!("Manual sync rejected: another run is active");
            return Ok(ManualSyncResult::rejected(SYNC_ALREADY_RUNNING));
        };

        let cancel = lock(&self.cancel).clone();
        let outcome = self.runner.run_fast(SyncTrigger::Manual, &cancel).await?;
        Ok(outcome.to_manual_result())
    }

    pub async fn status(&self) -> Result<SyncStatusReport> {
        let market_status = self.market.current_status().await;
        Ok(SyncStatusReport {
            is_running: self.run_state() != RunState::Idle,
            scheduler_active: self.is_active(),
            market_open: market_status.is_open,
            market_status,
            recent_jobs: self.jobs.recent_jobs(RECENT_JOBS_LIMIT as i64)?,
        })
    }

    fn load_history(&self) -> Result<SyncHistory> {
        let hours = self.market.trading_hours();
        let last_market_hours_run = self
            .jobs
            .latest_by_trigger(SyncTrigger::MarketHours)?
            .map(|job| job.started_at);
        let last_post_close_date = self
            .jobs
            .latest_by_trigger(SyncTrigger::PostClose)?
            .filter(|job| job.status != SyncJobStatus::Failed)
            .map(|job| hours.local_date(job.started_at));
        Ok(SyncHistory {
            last_market_hours_run,
            last_post_close_date,
        })
    }
}

fn try_begin(state: &Arc<Mutex<RunState>>, trigger: SyncTrigger) -> Option<RunGuard> {
    let mut current = lock(state);
    if *current != RunState::Idle {
        return None;
    }
    *current = RunState::Running {
        trigger,
        started_at: Utc::now(),
    };
    Some(RunGuard {
        state: state.clone(),
    })
}

/// State moved into the spawned task.
struct SchedulerLoop {
    runner: Arc<SyncRunner>,
    market: Arc<dyn MarketStatusSource>,
    jobs: Arc<dyn SyncJobStore>,
    run_state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
    clock: Clock,
    history: SyncHistory,
}

impl SchedulerLoop {
    async fn run(mut self) {
        let interval = self.runner.config().market_hours_interval();

        while !self.cancel.is_cancelled() {
            let status = self.market.current_status().await;
            let now = (self.clock)();
            let plan = plan_next_run(
                now,
                self.market.trading_hours(),
                &status,
                &self.history,
                interval,
            );

            match plan {
                SyncPlan::Run(trigger) => {
                    let Some(guard) = try_begin(&self.run_state, trigger) else {
                        debug!("Scheduled {:?} sync deferred: another run is active", trigger);
                        if !self.pause(BUSY_RETRY).await {
                            break;
                        }
                        continue;
                    };

                    let completed = self.run_once(trigger).await;
                    drop(guard);

                    match trigger {
                        SyncTrigger::MarketHours => self.history.last_market_hours_run = Some(now),
                        SyncTrigger::PostClose if completed => {
                            self.history.last_post_close_date =
                                Some(self.market.trading_hours().local_date(now))
                        }
                        SyncTrigger::PostClose => {
                            warn!(
                                "Post-close sync did not complete, retrying in {:?}",
                                FAILED_RUN_RETRY
                            );
                            if !self.pause(FAILED_RUN_RETRY).await {
                                break;
                            }
                        }
                        SyncTrigger::Manual => {}
                    }
                }
                SyncPlan::Sleep { until } => {
                    debug!("Next price sync check at {}", until);
                    if !self.pause(plan.delay_from(now)).await {
                        break;
                    }
                }
            }
        }
        debug!("Price sync scheduler loop exited");
    }

    /// One scheduled run. Returns true when it finished without error or
    /// cancellation. A panic is contained here and fails the job it left
    /// running.
    async fn run_once(&self, trigger: SyncTrigger) -> bool {
        let run = AssertUnwindSafe(self.runner.run_sequential(trigger, &self.cancel))
            .catch_unwind()
            .await;
        match run {
            Ok(Ok(outcome)) => {
                debug!("Scheduled sync finished: {:?}", outcome);
                !outcome.cancelled
            }
            Ok(Err(e)) => {
                error!("Scheduled {:?} sync failed: {}", trigger, e);
                false
            }
            Err(payload) => {
                let message = format!("Sync run panicked: {}", panic_message(payload.as_ref()));
                error!("Scheduled {:?} sync aborted. {}", trigger, message);
                match self.jobs.fail_running_jobs(&message).await {
                    Ok(failed) => debug!("Marked {} sync jobs as failed after panic", failed),
                    Err(e) => error!("Failed to mark panicked sync job as failed: {}", e),
                }
                false
            }
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

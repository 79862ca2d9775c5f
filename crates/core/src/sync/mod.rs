//! Background price sync.
//!
//! - [`PriceSyncScheduler`]: long-lived loop keeping the price cache warm
//! - [`SyncRunner`]: one run, sequential (background) or batched (manual)
//! - [`plan_next_run`]: pure planning against the exchange calendar
//! - [`SyncJobStore`] / [`SymbolPriorityStore`]: persistence seams

mod model;
mod runner;
pub mod schedule;
mod scheduler;
mod store;

pub use model::{
    ManualSyncResult, SymbolPriority, SyncJobRecord, SyncJobStatus, SyncProgress,
    SyncStatusReport, SyncTrigger,
};
pub use runner::{RunOutcome, SyncRunner};
pub use schedule::{plan_next_run, SyncHistory, SyncPlan};
pub use scheduler::{PriceSyncScheduler, RunGuard, RunState};
pub use store::{SymbolPriorityStore, SyncJobStore};

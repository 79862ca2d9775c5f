//! Sync job and symbol priority domain models.

use chrono::{DateTime, Utc};
use pricekeeper_market_data::{AssetKind, MarketStatus};
use serde::{Deserialize, Serialize};

/// Status of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncJobStatus {
    /// In progress
    #[default]
    Running,
    /// Every selected symbol was processed
    Completed,
    /// Aborted by an error or cancellation
    Failed,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Running => "RUNNING",
            SyncJobStatus::Completed => "COMPLETED",
            SyncJobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(SyncJobStatus::Running),
            "COMPLETED" => Some(SyncJobStatus::Completed),
            "FAILED" => Some(SyncJobStatus::Failed),
            _ => None,
        }
    }
}

/// What started a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncTrigger {
    /// Periodic refresh while the market trades
    MarketHours,
    /// Once-a-day refresh after the close
    PostClose,
    /// Operator request
    Manual,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::MarketHours => "MARKET_HOURS",
            SyncTrigger::PostClose => "POST_CLOSE",
            SyncTrigger::Manual => "MANUAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "MARKET_HOURS" => Some(SyncTrigger::MarketHours),
            "POST_CLOSE" => Some(SyncTrigger::PostClose),
            "MANUAL" => Some(SyncTrigger::Manual),
            _ => None,
        }
    }
}

/// One execution of the refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJobRecord {
    pub id: String,
    pub status: SyncJobStatus,
    pub trigger: SyncTrigger,
    pub symbols_total: i32,
    pub symbols_fetched: i32,
    pub symbols_failed: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SyncJobRecord {
    /// Create a running job for `symbols_total` symbols
    pub fn start(trigger: SyncTrigger, symbols_total: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SyncJobStatus::Running,
            trigger,
            symbols_total: symbols_total as i32,
            symbols_fetched: 0,
            symbols_failed: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SyncJobStatus::Running
    }
}

/// Counters written on progress flushes and at completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub fetched: usize,
    pub failed: usize,
}

impl SyncProgress {
    pub fn processed(&self) -> usize {
        self.fetched + self.failed
    }
}

/// Usage ranking of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPriority {
    pub symbol: String,
    pub asset_kind: AssetKind,
    /// Set by the holdings layer; higher syncs first
    pub priority: i32,
    pub request_count: i64,
    pub last_requested_at: Option<DateTime<Utc>>,
}

/// Outcome of a manual (fast) sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSyncResult {
    pub success: bool,
    pub message: String,
    pub fetched: usize,
    pub failed: usize,
    pub total: usize,
    /// The time budget ran out before every symbol was tried
    pub partial: bool,
}

impl ManualSyncResult {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            fetched: 0,
            failed: 0,
            total: 0,
            partial: false,
        }
    }
}

/// Snapshot served by the sync status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusReport {
    pub is_running: bool,
    pub scheduler_active: bool,
    pub market_open: bool,
    pub market_status: MarketStatus,
    pub recent_jobs: Vec<SyncJobRecord>,
}

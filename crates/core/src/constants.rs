/// How long a cached price counts as fresh while the market is open
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 30 * 60;

/// Overall budget for one request-path price lookup
pub const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 20;

/// Concurrent refreshes per bulk request
pub const DEFAULT_BULK_CONCURRENCY: usize = 8;

/// Minimum gap between market-hours sync runs
pub const DEFAULT_MARKET_HOURS_INTERVAL_SECS: u64 = 15 * 60;

/// Symbols refreshed per sync run
pub const DEFAULT_MAX_SYMBOLS_PER_SYNC: usize = 50;

/// Pause between symbols in a background run
pub const DEFAULT_SYMBOL_DELAY_MS: u64 = 3_000;

/// Upper bound of the random jitter added to each pause
pub const DEFAULT_JITTER_MAX_MS: u64 = 1_000;

/// Persist job progress every N symbols
pub const DEFAULT_PROGRESS_FLUSH_EVERY: usize = 5;

pub const DEFAULT_FAST_BATCH_SIZE: usize = 5;
pub const DEFAULT_FAST_BATCH_DELAY_MS: u64 = 500;
pub const DEFAULT_FAST_BUDGET_SECS: u64 = 25;

/// Jobs listed in the sync status report
pub const RECENT_JOBS_LIMIT: usize = 10;

/// Message returned when a manual sync overlaps another run
pub const SYNC_ALREADY_RUNNING: &str = "Sync already in progress";

/// Error message recorded on jobs interrupted by shutdown
pub const SYNC_CANCELLED: &str = "Sync cancelled";

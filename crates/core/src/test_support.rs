//! In-memory stores and stub collaborators shared by the core unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pricekeeper_market_data::{
    AssetKind, MarketDataError, MarketStatus, PriceProvider, PriceQuote, ProviderBudget,
    ProviderCapabilities, TradingHours,
};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::{DatabaseError, Error, Result};
use crate::market::MarketStatusSource;
use crate::prices::{CachedPriceEntry, PriceCacheStore};
use crate::sync::{
    SymbolPriority, SymbolPriorityStore, SyncJobRecord, SyncJobStatus, SyncJobStore, SyncProgress,
    SyncTrigger,
};

// =========================================================================
// Price cache
// =========================================================================

#[derive(Default)]
pub struct MockPriceCache {
    entries: Mutex<HashMap<String, CachedPriceEntry>>,
    fail_reads: Mutex<bool>,
    panic_on_put: Mutex<bool>,
}

impl MockPriceCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, entry: CachedPriceEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.symbol.clone(), entry);
    }

    pub fn entry(&self, symbol: &str) -> Option<CachedPriceEntry> {
        self.entries.lock().unwrap().get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn set_panic_on_put(&self, panic: bool) {
        *self.panic_on_put.lock().unwrap() = panic;
    }

    fn check_reads(&self) -> Result<()> {
        if *self.fail_reads.lock().unwrap() {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional read failure".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceCacheStore for MockPriceCache {
    fn get(&self, symbol: &str) -> Result<Option<CachedPriceEntry>> {
        self.check_reads()?;
        Ok(self.entry(symbol))
    }

    fn get_bulk(&self, symbols: &[String]) -> Result<HashMap<String, CachedPriceEntry>> {
        self.check_reads()?;
        let entries = self.entries.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| entries.get(s).map(|e| (s.clone(), e.clone())))
            .collect())
    }

    async fn put(
        &self,
        symbol: &str,
        quote: &PriceQuote,
        source: &str,
    ) -> Result<CachedPriceEntry> {
        let panic = *self.panic_on_put.lock().unwrap();
        if panic {
            panic!("cache write for {} blew up", symbol);
        }
        let entry = CachedPriceEntry::from_quote(symbol, quote, source, Utc::now());
        self.insert(entry.clone());
        Ok(entry)
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.len())
    }
}

// =========================================================================
// Symbol priorities
// =========================================================================

#[derive(Default)]
pub struct MockPriorityStore {
    rows: Mutex<HashMap<String, SymbolPriority>>,
    fail_reads: Mutex<bool>,
}

impl MockPriorityStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_count(&self, symbol: &str) -> i64 {
        self.rows
            .lock()
            .unwrap()
            .get(symbol)
            .map(|r| r.request_count)
            .unwrap_or(0)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }
}

#[async_trait]
impl SymbolPriorityStore for MockPriorityStore {
    async fn record_request(&self, symbol: &str, asset_kind: AssetKind) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolPriority {
                symbol: symbol.to_string(),
                asset_kind,
                priority: 0,
                request_count: 0,
                last_requested_at: None,
            });
        row.request_count += 1;
        row.last_requested_at = Some(Utc::now());
        Ok(())
    }

    async fn register_symbol(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        priority: i32,
    ) -> Result<SymbolPriority> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolPriority {
                symbol: symbol.to_string(),
                asset_kind,
                priority,
                request_count: 0,
                last_requested_at: None,
            });
        row.asset_kind = asset_kind;
        row.priority = priority;
        Ok(row.clone())
    }

    fn top_symbols(&self, limit: i64) -> Result<Vec<SymbolPriority>> {
        if *self.fail_reads.lock().unwrap() {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional read failure".to_string(),
            )));
        }
        let mut rows: Vec<_> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.request_count.cmp(&a.request_count))
                .then(a.symbol.cmp(&b.symbol))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    fn get(&self, symbol: &str) -> Result<Option<SymbolPriority>> {
        Ok(self.rows.lock().unwrap().get(symbol).cloned())
    }
}

// =========================================================================
// Sync jobs
// =========================================================================

#[derive(Default)]
pub struct MockJobStore {
    jobs: Mutex<Vec<SyncJobRecord>>,
    progress_flushes: AtomicUsize,
}

impl MockJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<SyncJobRecord> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn progress_flushes(&self) -> usize {
        self.progress_flushes.load(Ordering::SeqCst)
    }

    pub fn push(&self, job: SyncJobRecord) {
        self.jobs.lock().unwrap().push(job);
    }
}

#[async_trait]
impl SyncJobStore for MockJobStore {
    async fn create_job(&self, job: &SyncJobRecord) -> Result<()> {
        self.push(job.clone());
        Ok(())
    }

    async fn update_progress(&self, job_id: &str, progress: SyncProgress) -> Result<()> {
        self.progress_flushes.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.symbols_fetched = progress.fetched as i32;
            job.symbols_failed = progress.failed as i32;
        }
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: &str,
        status: SyncJobStatus,
        progress: SyncProgress,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(job_id.to_string()))?;
        job.status = status;
        job.symbols_fetched = progress.fetched as i32;
        job.symbols_failed = progress.failed as i32;
        job.completed_at = Some(Utc::now());
        job.error_message = error_message;
        Ok(())
    }

    fn recent_jobs(&self, limit: i64) -> Result<Vec<SyncJobRecord>> {
        let mut jobs = self.jobs();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    fn latest_by_trigger(&self, trigger: SyncTrigger) -> Result<Option<SyncJobRecord>> {
        Ok(self
            .jobs()
            .into_iter()
            .filter(|j| j.trigger == trigger)
            .max_by_key(|j| j.started_at))
    }

    async fn fail_running_jobs(&self, message: &str) -> Result<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut touched = 0;
        for job in jobs.iter_mut().filter(|j| j.is_running()) {
            job.status = SyncJobStatus::Failed;
            job.error_message = Some(message.to_string());
            job.completed_at = Some(Utc::now());
            touched += 1;
        }
        Ok(touched)
    }
}

// =========================================================================
// Market status
// =========================================================================

pub struct FixedMarket {
    status: Mutex<MarketStatus>,
    hours: TradingHours,
}

impl FixedMarket {
    pub fn new(status: MarketStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            hours: TradingHours::default(),
        })
    }

    pub fn set(&self, status: MarketStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl MarketStatusSource for FixedMarket {
    async fn current_status(&self) -> MarketStatus {
        *self.status.lock().unwrap()
    }

    fn trading_hours(&self) -> &TradingHours {
        &self.hours
    }
}

// =========================================================================
// Provider
// =========================================================================

/// Provider answering from a price table; unknown symbols fail.
pub struct StubProvider {
    prices: Mutex<HashMap<String, Decimal>>,
    previous_close: Decimal,
    live_session: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(prices: &[(&str, Decimal)], previous_close: Decimal) -> Self {
        Self {
            prices: Mutex::new(
                prices
                    .iter()
                    .map(|(s, p)| (s.to_string(), *p))
                    .collect(),
            ),
            previous_close,
            live_session: true,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_live_session(mut self, live: bool) -> Self {
        self.live_session = live;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for StubProvider {
    fn id(&self) -> &'static str {
        "STUB"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: &[AssetKind::Equity, AssetKind::MutualFund, AssetKind::Metal],
            intraday: true,
        }
    }

    fn budget(&self) -> ProviderBudget {
        ProviderBudget::new(100, Duration::from_secs(60), Duration::from_secs(60))
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        _kind: AssetKind,
    ) -> std::result::Result<PriceQuote, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let price = self.prices.lock().unwrap().get(symbol).copied();
        match price {
            Some(price) => Ok(PriceQuote::new(
                symbol,
                price,
                Some(self.previous_close),
                "INR",
                NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
                self.live_session,
                Cow::Borrowed("STUB"),
            )),
            None => Err(MarketDataError::ProviderError {
                provider: "STUB".to_string(),
                message: format!("no price for {}", symbol),
            }),
        }
    }
}

//! Monitor Orchestrator
//!
//! Owns the poll loop: cooldown check, fetch one page at the controller's
//! page size, partition into new / overlap through the dedup store, detect
//! deals, notify, retune the rate controller, run retention maintenance,
//! then sleep.
//!
//! Notification failures are not retried on a schedule. A listing whose
//! alert failed stays seen-but-not-notified and gets another attempt the
//! next time it shows up in a page.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};

use crate::application::alert::{deal_alert, log_deal};
use crate::application::dedup::{DedupStore, DEFAULT_RETENTION_DAYS};
use crate::domain::{
    Adjustment, CycleSignal, CycleStats, DealDecision, DealDetector, Listing, RateController,
    RateControllerConfig, RateState, DEFAULT_MIN_DISCOUNT_FRACTION,
};
use crate::ports::listing_source::{FetchError, ListingSource, PageRequest};
use crate::ports::notifier::Notifier;
use crate::ports::seen_store::{SeenStore, StoreError, StoreStats};

/// Minimum listing price in cents passed to the API
pub const DEFAULT_MIN_PRICE_CENTS: u64 = 500;

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub min_price_cents: u64,
    pub sort_by: String,
    pub listing_type: String,
    pub min_discount_fraction: f64,
    pub retention_days: u32,
    pub maintenance_interval: Duration,
    pub error_backoff: Duration,
    /// Log deals without sending or marking them notified
    pub dry_run: bool,
    pub rate: RateControllerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_price_cents: DEFAULT_MIN_PRICE_CENTS,
            sort_by: "most_recent".to_string(),
            listing_type: "buy_now".to_string(),
            min_discount_fraction: DEFAULT_MIN_DISCOUNT_FRACTION,
            retention_days: DEFAULT_RETENTION_DAYS,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            dry_run: false,
            rate: RateControllerConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !(self.min_discount_fraction > 0.0 && self.min_discount_fraction < 1.0) {
            return Err(OrchestratorError::ConfigError(format!(
                "min_discount_fraction must be in (0, 1), got {}",
                self.min_discount_fraction
            )));
        }
        if self.retention_days == 0 {
            return Err(OrchestratorError::ConfigError(
                "retention_days must be at least 1".to_string(),
            ));
        }
        self.rate
            .validate()
            .map_err(|e| OrchestratorError::ConfigError(e.to_string()))
    }

    fn page_request(&self, limit: u32) -> PageRequest {
        PageRequest {
            sort_by: self.sort_by.clone(),
            limit,
            listing_type: self.listing_type.clone(),
            min_price: self.min_price_cents,
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Skipped without fetching; cooldown still active
    CoolingDown,
    RateLimited,
    FetchFailed,
}

/// Per-cycle counters, also used for the summary log line
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub page_size: u32,
    pub fetched: usize,
    pub new: usize,
    pub overlap: usize,
    pub deals: usize,
    pub notified: usize,
    pub notify_failures: usize,
    /// Listings skipped because the durable store failed
    pub store_errors: usize,
    pub adjustment: Option<Adjustment>,
    pub next_sleep: Duration,
}

impl CycleReport {
    fn empty(outcome: CycleOutcome, page_size: u32) -> Self {
        Self {
            outcome,
            page_size,
            fetched: 0,
            new: 0,
            overlap: 0,
            deals: 0,
            notified: 0,
            notify_failures: 0,
            store_errors: 0,
            adjustment: None,
            next_sleep: Duration::ZERO,
        }
    }
}

struct MonitorState<S: SeenStore> {
    dedup: DedupStore<S>,
    controller: RateController,
    rng: StdRng,
    last_maintenance: Option<u64>,
    cycles: u64,
}

/// Main poll loop over a listing source, seen store and notifier
pub struct MonitorOrchestrator<L, S, N>
where
    L: ListingSource,
    S: SeenStore,
    N: Notifier,
{
    source: Arc<L>,
    notifier: Arc<N>,
    detector: DealDetector,
    config: OrchestratorConfig,
    state: Arc<Mutex<MonitorState<S>>>,
    is_running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
}

impl<L, S, N> MonitorOrchestrator<L, S, N>
where
    L: ListingSource,
    S: SeenStore,
    N: Notifier,
{
    pub fn new(
        config: OrchestratorConfig,
        source: L,
        store: S,
        notifier: N,
    ) -> Result<Self, OrchestratorError> {
        Self::with_dedup(config, source, DedupStore::new(store), notifier)
    }

    pub fn with_dedup(
        config: OrchestratorConfig,
        source: L,
        dedup: DedupStore<S>,
        notifier: N,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;

        let state = MonitorState {
            dedup,
            controller: RateController::new(config.rate.clone()),
            rng: StdRng::from_entropy(),
            last_maintenance: None,
            cycles: 0,
        };

        Ok(Self {
            source: Arc::new(source),
            notifier: Arc::new(notifier),
            detector: DealDetector::new(config.min_discount_fraction),
            config,
            state: Arc::new(Mutex::new(state)),
            is_running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Deterministic jitter
    pub async fn with_rng_seed(self, seed: u64) -> Self {
        self.state.lock().await.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run until `stop` is called. Per-cycle errors are logged and followed
    /// by a fixed backoff; they never end the loop.
    pub async fn run(&self) -> Result<(), OrchestratorError> {
        *self.is_running.write().await = true;

        tracing::info!(
            "Starting monitor - source: {}, notifier: {}, min discount: {:.0}%, dry run: {}",
            self.source.name(),
            self.notifier.name(),
            self.config.min_discount_fraction * 100.0,
            self.config.dry_run
        );

        while *self.is_running.read().await {
            let pause = match self.tick().await {
                Ok(report) => report.next_sleep,
                Err(e) => {
                    tracing::error!("Cycle error: {} (retrying in {:?})", e, self.config.error_backoff);
                    self.config.error_backoff
                }
            };

            if !*self.is_running.read().await {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        tracing::info!("Monitor stopped");
        Ok(())
    }

    /// Execute one cycle at the current wall-clock time
    pub async fn tick(&self) -> Result<CycleReport, OrchestratorError> {
        self.tick_at(unix_now()).await
    }

    /// Execute one cycle as if the time were `now` (unix seconds)
    pub async fn tick_at(&self, now: u64) -> Result<CycleReport, OrchestratorError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.cycles += 1;

        if let Some(remaining) = state.controller.cooldown_remaining(now) {
            tracing::info!("Cooling down, {}s left", remaining.as_secs());
            let mut report = CycleReport::empty(CycleOutcome::CoolingDown, state.controller.page_size());
            report.next_sleep = remaining;
            return Ok(report);
        }

        let page_size = state.controller.page_size();
        let request = self.config.page_request(page_size);

        let (mut report, signal) = match self.source.fetch_page(&request).await {
            Ok(page) => {
                let mut report = CycleReport::empty(CycleOutcome::Completed, page_size);
                self.process_listings(&mut state.dedup, &page.listings, &mut report).await;
                let signal = CycleSignal::Completed(CycleStats {
                    overlap: report.overlap,
                    new: report.new,
                    total: report.fetched,
                    remaining: page.rate.remaining,
                });
                (report, signal)
            }
            Err(FetchError::RateLimited { reset_secs, remaining }) => (
                CycleReport::empty(CycleOutcome::RateLimited, page_size),
                CycleSignal::Rejected { reset_secs, remaining },
            ),
            Err(e) => {
                tracing::warn!("Fetch from {} failed: {}", self.source.name(), e);
                (
                    CycleReport::empty(CycleOutcome::FetchFailed, page_size),
                    CycleSignal::Failed { remaining: e.remaining() },
                )
            }
        };

        report.adjustment = Some(state.controller.observe(signal, now));

        report.next_sleep = match state.controller.cooldown_remaining(now) {
            Some(cooldown) => cooldown,
            None => state.controller.next_sleep(&mut state.rng),
        };

        tracing::info!(
            "Cycle {}: fetched={} new={} overlap={} deals={} notified={} | page {} -> {} | sleep {:.1}s",
            state.cycles,
            report.fetched,
            report.new,
            report.overlap,
            report.deals,
            report.notified,
            page_size,
            state.controller.page_size(),
            report.next_sleep.as_secs_f64()
        );

        self.maintain(state, now, &mut report);

        Ok(report)
    }

    async fn process_listings(
        &self,
        dedup: &mut DedupStore<S>,
        listings: &[Listing],
        report: &mut CycleReport,
    ) {
        report.fetched = listings.len();

        for listing in listings {
            match dedup.is_seen(&listing.id) {
                Ok(true) => report.overlap += 1,
                Ok(false) => {
                    if let Err(e) = dedup.mark_seen(&listing.id) {
                        tracing::warn!("Skipping listing {}: {}", listing.id, e);
                        report.store_errors += 1;
                        continue;
                    }
                    report.new += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping listing {}: {}", listing.id, e);
                    report.store_errors += 1;
                    continue;
                }
            }

            let (discount_pct, reference_major) = match self.detector.evaluate(listing) {
                DealDecision::Deal { discount_pct, reference_major } => (discount_pct, reference_major),
                DealDecision::NotADeal { .. } | DealDecision::NoReference => continue,
            };

            match dedup.is_notified(&listing.id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Cannot check notified state for {}: {}", listing.id, e);
                    report.store_errors += 1;
                    continue;
                }
            }

            report.deals += 1;
            log_deal(listing, discount_pct, reference_major, self.config.dry_run);

            if self.config.dry_run {
                continue;
            }

            let notification = deal_alert(listing, discount_pct, reference_major);
            match self.notifier.send(&notification).await {
                Ok(()) => {
                    report.notified += 1;
                    if let Err(e) = dedup.mark_notified(&listing.id) {
                        tracing::warn!("Sent alert for {} but could not record it: {}", listing.id, e);
                        report.store_errors += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!("Notification for {} failed: {}", listing.id, e);
                    report.notify_failures += 1;
                }
            }
        }
    }

    /// Retention sweep once per interval. A failed sweep stays due and is
    /// retried next cycle; it never costs the cycle its report or sleep.
    fn maintain(&self, state: &mut MonitorState<S>, now: u64, report: &mut CycleReport) {
        let due = match state.last_maintenance {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.config.maintenance_interval.as_secs(),
        };
        if !due {
            return;
        }

        match state.dedup.cleanup(self.config.retention_days) {
            Ok(_) => state.last_maintenance = Some(now),
            Err(e) => {
                tracing::warn!("Retention sweep failed, retrying next cycle: {}", e);
                report.store_errors += 1;
            }
        }
    }

    /// Signal the loop to stop after the current cycle
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        self.shutdown.notify_one();
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn rate_state(&self) -> RateState {
        self.state.lock().await.controller.state()
    }

    pub async fn store_stats(&self) -> Result<StoreStats, OrchestratorError> {
        Ok(self.state.lock().await.dedup.stats()?)
    }
}

impl<L, S, N> Clone for MonitorOrchestrator<L, S, N>
where
    L: ListingSource,
    S: SeenStore,
    N: Notifier,
{
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            notifier: Arc::clone(&self.notifier),
            detector: self.detector,
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            is_running: Arc::clone(&self.is_running),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

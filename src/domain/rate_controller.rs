//! Rate Controller
//!
//! Adaptive poll pacing. After every cycle the controller looks at how many
//! listings overlapped with what we already knew, how many were new, and how
//! much request budget the server says is left, then picks the next page
//! size and inter-poll delay.
//!
//! Overlap is the proxy for polling frequency: zero overlap means we may
//! have missed listings between two polls, a lot of overlap means we are
//! spending requests on ids we already have.
//!
//! A rate-limit rejection puts the controller into cooldown; while cooldown
//! is active no fetch should be attempted.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default base poll interval in seconds
pub const DEFAULT_BASE_INTERVAL_SECS: f64 = 10.0;

/// Default upper bound for adaptive sleep in seconds
pub const DEFAULT_SLEEP_CEILING_SECS: f64 = 45.0;

/// Default page size bounds
pub const DEFAULT_MIN_PAGE_SIZE: u32 = 25;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 50;

/// Page size the controller drifts back to when overlap is on target
pub const DEFAULT_BASELINE_PAGE_SIZE: u32 = 40;

/// Desired number of already-known ids per page
pub const DEFAULT_TARGET_OVERLAP: u32 = 4;

/// New listings per page above which the market counts as flooding
pub const DEFAULT_BURST_THRESHOLD: u32 = 10;

/// Minimum cooldown after a rate-limit rejection
pub const DEFAULT_COOLDOWN_MIN_SECS: u64 = 120;

/// Remaining-request marks for the headroom override
pub const DEFAULT_HEADROOM_CRITICAL: u32 = 5;
pub const DEFAULT_HEADROOM_LOW: u32 = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateControllerError {
    #[error("Invalid rate controller config: {0}")]
    InvalidConfig(String),
}

/// Tunables. Defaults were found by trial against one marketplace's traffic
/// and are not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateControllerConfig {
    pub base_interval_secs: f64,
    pub sleep_ceiling_secs: f64,
    pub min_page_size: u32,
    pub max_page_size: u32,
    pub baseline_page_size: u32,
    pub initial_page_size: u32,
    pub target_overlap: u32,
    /// Overlap above `target_overlap * overlap_excess_factor` narrows the page
    pub overlap_excess_factor: u32,
    pub burst_threshold: u32,
    /// Page growth when flooding
    pub burst_step: u32,
    /// Page growth when overlap is short
    pub widen_step: u32,
    /// Page shrink when overlap is excessive
    pub narrow_step: u32,
    /// Sleep multiplier when overlap is short (< 1.0)
    pub shorten_factor: f64,
    /// Sleep multiplier when overlap is excessive (> 1.0)
    pub lengthen_factor: f64,
    pub cooldown_min_secs: u64,
    pub cooldown_reset_multiplier: u64,
    pub headroom_critical: u32,
    pub headroom_critical_sleep_secs: f64,
    pub headroom_low: u32,
    pub headroom_low_sleep_secs: f64,
    pub jitter_min_secs: f64,
    pub jitter_max_secs: f64,
}

impl Default for RateControllerConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: DEFAULT_BASE_INTERVAL_SECS,
            sleep_ceiling_secs: DEFAULT_SLEEP_CEILING_SECS,
            min_page_size: DEFAULT_MIN_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            baseline_page_size: DEFAULT_BASELINE_PAGE_SIZE,
            initial_page_size: DEFAULT_MAX_PAGE_SIZE,
            target_overlap: DEFAULT_TARGET_OVERLAP,
            overlap_excess_factor: 3,
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            burst_step: 10,
            widen_step: 5,
            narrow_step: 5,
            shorten_factor: 0.9,
            lengthen_factor: 1.25,
            cooldown_min_secs: DEFAULT_COOLDOWN_MIN_SECS,
            cooldown_reset_multiplier: 2,
            headroom_critical: DEFAULT_HEADROOM_CRITICAL,
            headroom_critical_sleep_secs: 60.0,
            headroom_low: DEFAULT_HEADROOM_LOW,
            headroom_low_sleep_secs: 15.0,
            jitter_min_secs: 0.5,
            jitter_max_secs: 2.0,
        }
    }
}

impl RateControllerConfig {
    pub fn validate(&self) -> Result<(), RateControllerError> {
        if !(self.base_interval_secs > 0.0) {
            return Err(RateControllerError::InvalidConfig(format!(
                "base_interval_secs must be > 0, got {}",
                self.base_interval_secs
            )));
        }
        if self.sleep_ceiling_secs < self.base_interval_secs {
            return Err(RateControllerError::InvalidConfig(format!(
                "sleep_ceiling_secs ({}) must be >= base_interval_secs ({})",
                self.sleep_ceiling_secs, self.base_interval_secs
            )));
        }
        if self.min_page_size == 0 || self.min_page_size > self.max_page_size {
            return Err(RateControllerError::InvalidConfig(format!(
                "page size bounds invalid: [{}, {}]",
                self.min_page_size, self.max_page_size
            )));
        }
        if !(self.shorten_factor > 0.0 && self.shorten_factor <= 1.0) {
            return Err(RateControllerError::InvalidConfig(format!(
                "shorten_factor must be in (0, 1], got {}",
                self.shorten_factor
            )));
        }
        if self.lengthen_factor < 1.0 {
            return Err(RateControllerError::InvalidConfig(format!(
                "lengthen_factor must be >= 1, got {}",
                self.lengthen_factor
            )));
        }
        if self.jitter_min_secs < 0.0 || self.jitter_max_secs < self.jitter_min_secs {
            return Err(RateControllerError::InvalidConfig(format!(
                "jitter range invalid: [{}, {}]",
                self.jitter_min_secs, self.jitter_max_secs
            )));
        }
        for (name, secs) in [
            ("sleep_ceiling_secs", self.sleep_ceiling_secs),
            ("jitter_max_secs", self.jitter_max_secs),
            ("headroom_critical_sleep_secs", self.headroom_critical_sleep_secs),
            ("headroom_low_sleep_secs", self.headroom_low_sleep_secs),
        ] {
            if !(secs.is_finite() && secs >= 0.0) {
                return Err(RateControllerError::InvalidConfig(format!(
                    "{} must be a finite value >= 0, got {}",
                    name, secs
                )));
            }
        }
        if self.headroom_low < self.headroom_critical {
            return Err(RateControllerError::InvalidConfig(format!(
                "headroom_low ({}) must be >= headroom_critical ({})",
                self.headroom_low, self.headroom_critical
            )));
        }
        Ok(())
    }
}

/// What a cycle's fetch produced, as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleSignal {
    /// Page fetched and partitioned
    Completed(CycleStats),
    /// Server rejected the request for rate limiting
    Rejected {
        reset_secs: u64,
        remaining: Option<u32>,
    },
    /// Any other fetch failure; adaptive tuning is skipped
    Failed { remaining: Option<u32> },
}

/// Counters from one successful fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub overlap: usize,
    pub new: usize,
    pub total: usize,
    pub remaining: u32,
}

/// Which branch the controller took for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningBranch {
    /// Rejection: cooldown entered
    Cooldown,
    /// Zero overlap with a non-empty page
    ChainBreak,
    /// New-item velocity above the burst threshold
    Burst,
    /// Overlap below target
    Widen,
    /// Overlap far above target
    Narrow,
    /// Overlap near target
    Hold,
    /// Fetch failed; nothing tuned
    Skipped,
}

/// Headroom override applied at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Headroom {
    Ok,
    Low,
    Critical,
}

/// Outcome of `observe`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub branch: TuningBranch,
    pub headroom: Headroom,
}

/// Snapshot for logging and status output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateState {
    pub current_limit: u32,
    pub sleep_time: f64,
    pub consecutive_overlap_anomalies: u32,
    /// Unix seconds; 0 when inactive
    pub cooldown_until: u64,
}

/// Adaptive page-size and delay controller
#[derive(Debug, Clone)]
pub struct RateController {
    config: RateControllerConfig,
    current_limit: u32,
    sleep_time: f64,
    consecutive_overlap_anomalies: u32,
    cooldown_until: u64,
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(RateControllerConfig::default())
    }
}

impl RateController {
    pub fn new(config: RateControllerConfig) -> Self {
        let current_limit = config
            .initial_page_size
            .clamp(config.min_page_size, config.max_page_size.max(config.min_page_size));
        let sleep_time = config.base_interval_secs;
        Self {
            config,
            current_limit,
            sleep_time,
            consecutive_overlap_anomalies: 0,
            cooldown_until: 0,
        }
    }

    pub fn config(&self) -> &RateControllerConfig {
        &self.config
    }

    /// Page size to request next
    pub fn page_size(&self) -> u32 {
        self.current_limit
    }

    /// Current delay before jitter, in seconds
    pub fn sleep_time(&self) -> f64 {
        self.sleep_time
    }

    pub fn consecutive_overlap_anomalies(&self) -> u32 {
        self.consecutive_overlap_anomalies
    }

    pub fn state(&self) -> RateState {
        RateState {
            current_limit: self.current_limit,
            sleep_time: self.sleep_time,
            consecutive_overlap_anomalies: self.consecutive_overlap_anomalies,
            cooldown_until: self.cooldown_until,
        }
    }

    /// Returns true if a cooldown is active at `now`
    pub fn in_cooldown(&self, now: u64) -> bool {
        self.cooldown_until != 0 && now < self.cooldown_until
    }

    /// Remaining cooldown at `now`, or None when polling may proceed.
    ///
    /// An expired cooldown is cleared.
    pub fn cooldown_remaining(&mut self, now: u64) -> Option<Duration> {
        if self.cooldown_until == 0 {
            return None;
        }
        if now >= self.cooldown_until {
            tracing::info!("Rate-limit cooldown complete, resuming polling");
            self.cooldown_until = 0;
            return None;
        }
        Some(Duration::from_secs(self.cooldown_until - now))
    }

    /// Feed one cycle's signal into the controller
    pub fn observe(&mut self, signal: CycleSignal, now: u64) -> Adjustment {
        let (branch, remaining) = match signal {
            CycleSignal::Rejected { reset_secs, remaining } => {
                self.enter_cooldown(reset_secs, now);
                (TuningBranch::Cooldown, remaining)
            }
            CycleSignal::Failed { remaining } => (TuningBranch::Skipped, remaining),
            CycleSignal::Completed(stats) => (self.tune(&stats), Some(stats.remaining)),
        };

        let headroom = match remaining {
            Some(remaining) => self.apply_headroom(remaining),
            None => Headroom::Ok,
        };

        Adjustment { branch, headroom }
    }

    /// Delay until the next poll: current sleep plus uniform jitter
    pub fn next_sleep<R: Rng>(&self, rng: &mut R) -> Duration {
        let jitter = if self.config.jitter_max_secs > self.config.jitter_min_secs {
            rng.gen_range(self.config.jitter_min_secs..self.config.jitter_max_secs)
        } else {
            self.config.jitter_min_secs
        };
        Duration::from_secs_f64((self.sleep_time + jitter).max(0.0))
    }

    fn enter_cooldown(&mut self, reset_secs: u64, now: u64) {
        let cooldown = self
            .config
            .cooldown_min_secs
            .max(reset_secs.saturating_mul(self.config.cooldown_reset_multiplier));
        self.cooldown_until = now + cooldown;
        self.sleep_time = self.config.base_interval_secs;
        tracing::warn!(
            "Rate limit hit (server reset {}s), cooling down for {}s",
            reset_secs,
            cooldown
        );
    }

    fn tune(&mut self, stats: &CycleStats) -> TuningBranch {
        let cfg = &self.config;

        if stats.overlap == 0 && stats.total > 0 {
            self.consecutive_overlap_anomalies += 1;
            self.current_limit = cfg.max_page_size;
            self.sleep_time = self.clamp_sleep(self.sleep_time / 2.0);
            tracing::warn!(
                "Chain break: no overlap in {} listings (anomaly #{}), page -> {}, sleep -> {:.1}s",
                stats.total,
                self.consecutive_overlap_anomalies,
                self.current_limit,
                self.sleep_time
            );
            return TuningBranch::ChainBreak;
        }

        if stats.overlap > 0 {
            self.consecutive_overlap_anomalies = 0;
        }

        let target = cfg.target_overlap as usize;
        let (branch, limit, sleep) = if stats.new > cfg.burst_threshold as usize {
            (
                TuningBranch::Burst,
                self.current_limit.saturating_add(cfg.burst_step),
                cfg.base_interval_secs,
            )
        } else if stats.overlap < target {
            (
                TuningBranch::Widen,
                self.current_limit.saturating_add(cfg.widen_step),
                self.sleep_time * cfg.shorten_factor,
            )
        } else if stats.overlap > target * cfg.overlap_excess_factor as usize {
            (
                TuningBranch::Narrow,
                self.current_limit.saturating_sub(cfg.narrow_step),
                self.sleep_time * cfg.lengthen_factor,
            )
        } else {
            let limit = match self.current_limit.cmp(&cfg.baseline_page_size) {
                std::cmp::Ordering::Less => self.current_limit + 1,
                std::cmp::Ordering::Greater => self.current_limit - 1,
                std::cmp::Ordering::Equal => self.current_limit,
            };
            (TuningBranch::Hold, limit, self.sleep_time)
        };

        self.current_limit = limit.clamp(cfg.min_page_size, cfg.max_page_size);
        self.sleep_time = self.clamp_sleep(sleep);

        tracing::debug!(
            "Tuning {:?}: overlap={} new={} total={} -> page {} sleep {:.1}s",
            branch,
            stats.overlap,
            stats.new,
            stats.total,
            self.current_limit,
            self.sleep_time
        );
        branch
    }

    /// Lengthen-only override driven by the server's remaining budget
    fn apply_headroom(&mut self, remaining: u32) -> Headroom {
        if remaining < self.config.headroom_critical {
            self.sleep_time = self.sleep_time.max(self.config.headroom_critical_sleep_secs);
            tracing::warn!(
                "Rate limit critical ({} left), delay >= {:.0}s",
                remaining,
                self.sleep_time
            );
            Headroom::Critical
        } else if remaining < self.config.headroom_low {
            self.sleep_time = self.sleep_time.max(self.config.headroom_low_sleep_secs);
            tracing::info!("Rate limit low ({} left), delay >= {:.0}s", remaining, self.sleep_time);
            Headroom::Low
        } else {
            Headroom::Ok
        }
    }

    fn clamp_sleep(&self, secs: f64) -> f64 {
        secs.clamp(self.config.base_interval_secs, self.config.sleep_ceiling_secs)
    }
}

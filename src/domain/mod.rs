//! Domain Layer - Core logic for the listing monitor
//!
//! Pure types and decisions with no I/O. External interactions happen
//! through the ports layer.
//!
//! - `listing`: Listing, Item and Reference models
//! - `deal_detector`: discount threshold check
//! - `rate_controller`: adaptive page size / delay / cooldown
//! - `id_window`: bounded recency-ordered id cache

pub mod listing;
pub mod deal_detector;
pub mod rate_controller;
pub mod id_window;

pub use listing::{Listing, Item, Reference, LISTING_URL_BASE};
pub use deal_detector::{DealDetector, DealDecision, DEFAULT_MIN_DISCOUNT_FRACTION};
pub use rate_controller::{
    RateController, RateControllerConfig, RateControllerError, RateState,
    CycleSignal, CycleStats, TuningBranch, Headroom, Adjustment,
};
pub use id_window::{LocalIdWindow, DEFAULT_WINDOW_CAPACITY, DEFAULT_WINDOW_TARGET};

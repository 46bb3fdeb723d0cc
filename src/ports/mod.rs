//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - The marketplace listings feed
//! - The durable seen/notified store
//! - Push notification delivery

pub mod listing_source;
pub mod seen_store;
pub mod notifier;
pub mod mocks;

pub use listing_source::{
    ListingSource, ListingPage, PageRequest, RateLimitInfo, FetchError,
    DEFAULT_RATE_REMAINING, DEFAULT_RATE_RESET_SECS,
};
pub use seen_store::{SeenStore, StoreError, StoreStats};
pub use notifier::{Notifier, Notification, NotifyError};

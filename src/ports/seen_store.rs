use chrono::{DateTime, Utc};
use thiserror::Error;

/// Durable-tier failure. Never to be read as "not seen".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Store query failed: {0}")]
    Query(String),

    #[error("Store write failed: {0}")]
    Write(String),
}

/// Row counts for status output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub total: u64,
    pub notified: u64,
}

/// Restart-surviving record of seen / notified listing ids
///
/// Every mutation is individually atomic and idempotent.
pub trait SeenStore: Send {
    fn is_seen(&self, id: &str) -> Result<bool, StoreError>;

    fn is_notified(&self, id: &str) -> Result<bool, StoreError>;

    /// Insert-if-absent; never touches an existing row's `notified` flag
    fn mark_seen(&mut self, id: &str) -> Result<(), StoreError>;

    /// One-way false -> true. Returns true if this call made the transition.
    fn mark_notified(&mut self, id: &str) -> Result<bool, StoreError>;

    /// Delete rows created before `cutoff`. Returns rows deleted.
    fn cleanup_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}

//! Two-tier Dedup Store
//!
//! Answers "seen before?" and "already notified?" across restarts. The
//! in-memory `LocalIdWindow` is consulted first; on a miss the durable
//! `SeenStore` decides, and a durable hit is back-filled into the window.
//! Durable errors always surface; they are never read as "not seen".

use chrono::{Duration, Utc};

use crate::domain::LocalIdWindow;
use crate::ports::seen_store::{SeenStore, StoreError, StoreStats};

pub const DEFAULT_RETENTION_DAYS: u32 = 7;

pub struct DedupStore<S: SeenStore> {
    window: LocalIdWindow,
    durable: S,
}

impl<S: SeenStore> DedupStore<S> {
    pub fn new(durable: S) -> Self {
        Self::with_window(durable, LocalIdWindow::new())
    }

    pub fn with_window(durable: S, window: LocalIdWindow) -> Self {
        Self { window, durable }
    }

    pub fn is_seen(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.window.contains(id) {
            return Ok(true);
        }
        let seen = self.durable.is_seen(id)?;
        if seen {
            self.window.insert(id);
        }
        Ok(seen)
    }

    /// Notified state is only tracked durably
    pub fn is_notified(&self, id: &str) -> Result<bool, StoreError> {
        self.durable.is_notified(id)
    }

    /// Durable insert first; the window only learns ids the store accepted
    pub fn mark_seen(&mut self, id: &str) -> Result<(), StoreError> {
        self.durable.mark_seen(id)?;
        self.window.insert(id);
        Ok(())
    }

    pub fn mark_notified(&mut self, id: &str) -> Result<bool, StoreError> {
        let changed = self.durable.mark_notified(id)?;
        self.window.insert(id);
        Ok(changed)
    }

    /// Delete durable rows older than `retention_days`. The window is untouched.
    pub fn cleanup(&mut self, retention_days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let deleted = self.durable.cleanup_before(cutoff)?;
        if deleted > 0 {
            tracing::info!("Retention sweep removed {} rows older than {} days", deleted, retention_days);
        } else {
            tracing::debug!("Retention sweep: nothing older than {} days", retention_days);
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.durable.stats()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

//! In-memory port implementations that record calls and allow scripted
//! responses. Cloning a mock shares its state, so a test can keep a handle
//! after moving the mock into the orchestrator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    FetchError, ListingPage, ListingSource, Notification, Notifier, NotifyError, PageRequest,
    RateLimitInfo, SeenStore, StoreError, StoreStats,
};
use crate::domain::Listing;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scripted listing source. Returns queued responses in order, then empty pages.
#[derive(Debug, Clone, Default)]
pub struct MockListingSource {
    responses: Arc<Mutex<VecDeque<Result<ListingPage, FetchError>>>>,
    requests: Arc<Mutex<Vec<PageRequest>>>,
}

impl MockListingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful page with the given remaining budget
    pub fn with_page(self, listings: Vec<Listing>, remaining: u32) -> Self {
        self.push_page(listings, remaining);
        self
    }

    /// Queue a failure
    pub fn with_error(self, error: FetchError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    pub fn push_page(&self, listings: Vec<Listing>, remaining: u32) {
        lock(&self.responses).push_back(Ok(ListingPage {
            listings,
            rate: RateLimitInfo {
                remaining,
                ..RateLimitInfo::default()
            },
        }));
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.requests).clone()
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage, FetchError> {
        lock(&self.requests).push(request.clone());
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Ok(ListingPage {
                listings: Vec::new(),
                rate: RateLimitInfo::default(),
            })
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct MemoryRow {
    notified: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    rows: HashMap<String, MemoryRow>,
    failing: HashSet<String>,
    failing_cleanups: usize,
    lookups: usize,
}

/// HashMap-backed durable tier with per-id failure injection
#[derive(Debug, Clone, Default)]
pub struct MemorySeenStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `id` fail with a `StoreError`
    pub fn fail_on(&self, id: &str) {
        lock(&self.inner).failing.insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        lock(&self.inner).failing.remove(id);
    }

    /// Make the next `count` retention sweeps fail
    pub fn fail_cleanups(&self, count: usize) {
        lock(&self.inner).failing_cleanups = count;
    }

    /// Insert a row with an explicit creation time
    pub fn insert_at(&self, id: &str, notified: bool, created_at: DateTime<Utc>) {
        lock(&self.inner)
            .rows
            .insert(id.to_string(), MemoryRow { notified, created_at });
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner).rows.contains_key(id)
    }

    pub fn notified(&self, id: &str) -> bool {
        lock(&self.inner).rows.get(id).map_or(false, |r| r.notified)
    }

    /// Number of `is_seen` lookups that reached this tier
    pub fn lookups(&self) -> usize {
        lock(&self.inner).lookups
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(inner: &MemoryStoreInner, id: &str) -> Result<(), StoreError> {
        if inner.failing.contains(id) {
            return Err(StoreError::Query(format!("injected failure for {}", id)));
        }
        Ok(())
    }
}

impl SeenStore for MemorySeenStore {
    fn is_seen(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = lock(&self.inner);
        inner.lookups += 1;
        Self::check(&inner, id)?;
        Ok(inner.rows.contains_key(id))
    }

    fn is_notified(&self, id: &str) -> Result<bool, StoreError> {
        let inner = lock(&self.inner);
        Self::check(&inner, id)?;
        Ok(inner.rows.get(id).map_or(false, |r| r.notified))
    }

    fn mark_seen(&mut self, id: &str) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        Self::check(&inner, id)?;
        inner.rows.entry(id.to_string()).or_insert(MemoryRow {
            notified: false,
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn mark_notified(&mut self, id: &str) -> Result<bool, StoreError> {
        let mut inner = lock(&self.inner);
        Self::check(&inner, id)?;
        let row = inner.rows.entry(id.to_string()).or_insert(MemoryRow {
            notified: false,
            created_at: Utc::now(),
        });
        if row.notified {
            return Ok(false);
        }
        row.notified = true;
        Ok(true)
    }

    fn cleanup_before(&mut self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut inner = lock(&self.inner);
        if inner.failing_cleanups > 0 {
            inner.failing_cleanups -= 1;
            return Err(StoreError::Query("injected cleanup failure".to_string()));
        }
        let before = inner.rows.len();
        inner.rows.retain(|_, row| row.created_at >= cutoff);
        Ok(before - inner.rows.len())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = lock(&self.inner);
        Ok(StoreStats {
            total: inner.rows.len() as u64,
            notified: inner.rows.values().filter(|r| r.notified).count() as u64,
        })
    }
}

/// Recording notifier. Fails while `set_failing(true)`.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if *lock(&self.failing) {
            return Err(NotifyError::Transport("injected failure".to_string()));
        }
        lock(&self.sent).push(notification.clone());
        Ok(())
    }
}

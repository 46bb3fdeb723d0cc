//! Local Id Window
//!
//! Bounded in-memory set of recently seen listing ids, used to skip
//! durable-store lookups for ids we saw in the last few polls.
//!
//! Insertion order is tracked explicitly so eviction always drops the
//! oldest ids first. When the window grows past `capacity` it is trimmed
//! down to `target` in one pass.

use std::collections::{HashSet, VecDeque};

/// Default maximum ids held before eviction
pub const DEFAULT_WINDOW_CAPACITY: usize = 2000;

/// Default size the window is trimmed to on eviction
pub const DEFAULT_WINDOW_TARGET: usize = 1000;

#[derive(Debug, Clone)]
pub struct LocalIdWindow {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
    target: usize,
}

impl Default for LocalIdWindow {
    fn default() -> Self {
        Self::with_config(DEFAULT_WINDOW_CAPACITY, DEFAULT_WINDOW_TARGET)
    }
}

impl LocalIdWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a window with custom bounds. `target` is capped at `capacity`.
    pub fn with_config(capacity: usize, target: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: HashSet::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
            target: target.min(capacity),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Insert an id. Returns false if it was already present.
    ///
    /// Re-inserting an existing id does not refresh its position.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }

        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());

        if self.order.len() > self.capacity {
            self.evict();
        }
        true
    }

    /// Drop oldest ids until the window is at `target`
    fn evict(&mut self) {
        let before = self.order.len();
        while self.order.len() > self.target {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.ids.remove(&oldest);
                }
                None => break,
            }
        }
        tracing::debug!("Id window evicted {} ids ({} kept)", before - self.order.len(), self.order.len());
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut window = LocalIdWindow::new();

        assert!(window.insert("a"));
        assert!(window.contains("a"));
        assert!(!window.contains("b"));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut window = LocalIdWindow::new();

        assert!(window.insert("a"));
        assert!(!window.insert("a"));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_eviction_settles_at_target() {
        let mut window = LocalIdWindow::with_config(2000, 1000);

        for i in 0..2001 {
            window.insert(&i.to_string());
        }

        assert_eq!(window.len(), 1000);
        assert!(window.len() <= window.capacity());
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let mut window = LocalIdWindow::with_config(10, 5);

        for i in 0..11 {
            window.insert(&format!("id-{}", i));
        }

        // 0..=5 evicted, 6..=10 kept
        for i in 0..6 {
            assert!(!window.contains(&format!("id-{}", i)), "id-{} should be evicted", i);
        }
        for i in 6..11 {
            assert!(window.contains(&format!("id-{}", i)), "id-{} should be kept", i);
        }
    }

    #[test]
    fn test_reinsert_does_not_refresh_age() {
        let mut window = LocalIdWindow::with_config(3, 2);

        window.insert("a");
        window.insert("b");
        window.insert("a");
        window.insert("c");
        window.insert("d");

        assert!(!window.contains("a"));
        assert!(!window.contains("b"));
        assert!(window.contains("c"));
        assert!(window.contains("d"));
    }

    #[test]
    fn test_never_exceeds_capacity_over_many_inserts() {
        let mut window = LocalIdWindow::with_config(50, 20);

        for i in 0..1_000 {
            window.insert(&i.to_string());
            assert!(window.len() <= 50);
        }
        assert!(window.contains("999"));
    }

    #[test]
    fn test_target_capped_at_capacity() {
        let mut window = LocalIdWindow::with_config(5, 10);
        for i in 0..6 {
            window.insert(&i.to_string());
        }
        assert_eq!(window.len(), 5);
        assert!(!window.contains("0"));
    }
}

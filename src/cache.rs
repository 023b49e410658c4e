//! Bounded in-memory structures (component B): an LRU map, a bounded FIFO
//! sequence, and a resource tracker for timers/observers/workers.
//!
//! Everything here is single-threaded (per §5, the system has no
//! shared-memory parallelism) so plain `HashMap`/`VecDeque` behind a
//! `RefCell`-free owned struct is enough; callers that need to share a
//! cache across async tasks wrap it in `Arc<Mutex<_>>` themselves.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// `get` promotes an entry to most-recently-used; `set` evicts the oldest
/// entry once the map exceeds `capacity`. Used for per-origin reputation,
/// URL-validation memoization, and document-scoped dedup.
#[derive(Debug, Clone)]
pub struct LruMap<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    map: HashMap<K, V>,
}

impl<K: Eq + Hash + Clone, V> LruMap<K, V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LruMap capacity must be positive");
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a key, promoting it to most-recently-used on hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.map.contains_key(key) {
            self.touch(key);
        }
        self.map.get(key)
    }

    /// Look up a key without affecting recency order.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or update an entry, evicting the least-recently-used entry
    /// if the map would otherwise exceed capacity.
    pub fn set(&mut self, key: K, value: V) {
        if self.map.contains_key(&key) {
            self.map.insert(key.clone(), value);
            self.touch(&key);
            return;
        }

        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).unwrap();
            self.order.push_back(k);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.map.clear();
    }
}

/// `push` shifts the oldest element off the head once the sequence is full.
/// Used for error history, memory samples, and the DOM-observer change
/// buffer.
#[derive(Debug, Clone)]
pub struct BoundedSeq<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedSeq<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedSeq capacity must be positive");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Drop entries down to 50% of capacity, keeping the most recent ones.
    /// Used by the lifecycle monitor's preventive-cleanup path.
    pub fn trim_to_half(&mut self) {
        let target = (self.capacity / 2).max(1);
        while self.items.len() > target {
            self.items.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Tracks handles that must be released on `cleanup()`: observer ids, timer
/// ids, worker handles, and named event-listener registrations. All
/// detectors and long-running subsystems register here instead of holding
/// their own ad-hoc globals, so a single `cleanup()` returns the page to a
/// quiescent state.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    observers: Vec<String>,
    timers: Vec<String>,
    workers: Vec<String>,
    listeners: Vec<(String, String)>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_observer(&mut self, id: impl Into<String>) {
        self.observers.push(id.into());
    }

    pub fn register_timer(&mut self, id: impl Into<String>) {
        self.timers.push(id.into());
    }

    pub fn register_worker(&mut self, id: impl Into<String>) {
        self.workers.push(id.into());
    }

    pub fn register_listener(&mut self, target: impl Into<String>, event: impl Into<String>) {
        self.listeners.push((target.into(), event.into()));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_quiescent(&self) -> bool {
        self.observers.is_empty()
            && self.timers.is_empty()
            && self.workers.is_empty()
            && self.listeners.is_empty()
    }

    /// Disconnect observers, clear timers/intervals, terminate workers, and
    /// drop listener registrations. Returns the count of each released so
    /// callers can log a summary.
    pub fn cleanup(&mut self) -> CleanupReport {
        let report = CleanupReport {
            observers: self.observers.len(),
            timers: self.timers.len(),
            workers: self.workers.len(),
            listeners: self.listeners.len(),
        };
        self.observers.clear();
        self.timers.clear();
        self.workers.clear();
        self.listeners.clear();
        report
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub observers: usize,
    pub timers: usize,
    pub workers: usize,
    pub listeners: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_oldest_on_overflow() {
        let mut lru = LruMap::new(2);
        lru.set("a", 1);
        lru.set("b", 2);
        lru.set("c", 3);
        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&"a"));
        assert!(lru.contains(&"b"));
        assert!(lru.contains(&"c"));
    }

    #[test]
    fn lru_get_promotes() {
        let mut lru = LruMap::new(2);
        lru.set("a", 1);
        lru.set("b", 2);
        lru.get(&"a");
        lru.set("c", 3);
        assert!(lru.contains(&"a"));
        assert!(!lru.contains(&"b"));
    }

    #[test]
    fn lru_size_never_exceeds_capacity() {
        let mut lru = LruMap::new(3);
        for i in 0..100 {
            lru.set(i, i * 2);
        }
        assert!(lru.len() <= 3);
    }

    #[test]
    fn bounded_seq_shifts_oldest_off_head() {
        let mut seq = BoundedSeq::new(3);
        seq.push(1);
        seq.push(2);
        seq.push(3);
        seq.push(4);
        let items: Vec<_> = seq.iter().copied().collect();
        assert_eq!(items, vec![2, 3, 4]);
    }

    #[test]
    fn bounded_seq_trim_to_half() {
        let mut seq = BoundedSeq::new(10);
        for i in 0..10 {
            seq.push(i);
        }
        seq.trim_to_half();
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn resource_tracker_cleanup_clears_everything() {
        let mut tracker = ResourceTracker::new();
        tracker.register_observer("mo-1");
        tracker.register_timer("t-1");
        tracker.register_worker("w-1");
        tracker.register_listener("window", "scroll");
        assert!(!tracker.is_quiescent());

        let report = tracker.cleanup();
        assert_eq!(report.observers, 1);
        assert_eq!(report.timers, 1);
        assert_eq!(report.workers, 1);
        assert_eq!(report.listeners, 1);
        assert!(tracker.is_quiescent());
    }
}

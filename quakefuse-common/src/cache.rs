//! Time-bounded object cache
//!
//! Keyed by public id. Entries idle longer than the TTL are removed by an
//! explicit `sweep` call from the engine's timer path, so eviction happens
//! in the same critical section as the engine's per-event bookkeeping
//! cleanup and never through a re-entrant callback.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<T> {
    value: T,
    touched: Instant,
}

#[derive(Debug)]
pub struct TimedCache<T> {
    entries: HashMap<String, Entry<T>>,
    ttl: Duration,
}

impl<T> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up and refresh the idle timer
    pub fn get(&mut self, id: &str) -> Option<&T> {
        let entry = self.entries.get_mut(id)?;
        entry.touched = Instant::now();
        Some(&entry.value)
    }

    /// Look up without refreshing the idle timer
    pub fn peek(&self, id: &str) -> Option<&T> {
        self.entries.get(id).map(|e| &e.value)
    }

    /// Insert or replace, refreshing the idle timer
    pub fn feed(&mut self, id: String, value: T) {
        self.entries.insert(
            id,
            Entry {
                value,
                touched: Instant::now(),
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.entries.remove(id).map(|e| e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter().map(|(id, e)| (id, &e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries idle longer than the TTL; returns their ids
    pub fn sweep(&mut self) -> Vec<String> {
        let ttl = self.ttl;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.touched.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_get_remove() {
        let mut cache = TimedCache::new(Duration::from_secs(60));
        cache.feed("a".into(), 1);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.peek("b"), None);
        assert_eq!(cache.remove("a"), Some(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let mut cache = TimedCache::new(Duration::ZERO);
        cache.feed("a".into(), 1);
        cache.feed("b".into(), 2);
        std::thread::sleep(Duration::from_millis(5));
        let mut evicted = cache.sweep();
        evicted.sort();
        assert_eq!(evicted, vec!["a".to_string(), "b".to_string()]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let mut cache = TimedCache::new(Duration::from_secs(60));
        cache.feed("a".into(), 1);
        assert!(cache.sweep().is_empty());
        assert!(cache.contains("a"));
    }
}

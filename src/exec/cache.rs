use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::runtime::value::ValueRef;

const DEFAULT_CAPACITY: usize = 256;

/// Memo of pure inline-evaluation results keyed by a digest of the language
/// and the source text.
///
/// Capacity handling is deliberately blunt: when the table is full a new
/// insertion clears it. Callers must only cache evaluations they know to be
/// pure; the cache cannot tell.
pub struct InlineCodeCache {
    entries: Mutex<HashMap<String, ValueRef>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InlineCodeCache {
    pub fn new() -> Self {
        InlineCodeCache::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        InlineCodeCache {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn key(language: &str, code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(language.as_bytes());
        hasher.update([0u8]);
        hasher.update(code.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn lookup(&self, language: &str, code: &str) -> Option<ValueRef> {
        let key = InlineCodeCache::key(language, code);
        let found = self.entries.lock().get(&key).cloned();
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn store(&self, language: &str, code: &str, value: ValueRef) {
        let key = InlineCodeCache::key(language, code);
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.clear();
        }
        entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for InlineCodeCache {
    fn default() -> Self {
        InlineCodeCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Value;
    use std::sync::Arc;

    #[test]
    fn test_hit_after_store() {
        let cache = InlineCodeCache::new();
        assert!(cache.lookup("python", "1 + 1").is_none());
        cache.store("python", "1 + 1", Arc::new(Value::Int(2)));

        let value = cache.lookup("python", "1 + 1").unwrap();
        assert_eq!(*value, Value::Int(2));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_key_distinguishes_language() {
        let cache = InlineCodeCache::new();
        cache.store("python", "x", Arc::new(Value::Int(1)));
        assert!(cache.lookup("javascript", "x").is_none());
    }

    #[test]
    fn test_full_cache_is_cleared_on_insert() {
        let cache = InlineCodeCache::with_capacity(2);
        cache.store("python", "a", Arc::new(Value::Int(1)));
        cache.store("python", "b", Arc::new(Value::Int(2)));
        cache.store("python", "c", Arc::new(Value::Int(3)));

        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("python", "c").is_some());
        assert!(cache.lookup("python", "a").is_none());
    }
}

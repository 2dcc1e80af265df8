//! Size- and time-bounded result cache
//!
//! Entries expire lazily: staleness is only checked when a key is read.
//! When full, the earliest-inserted entry is evicted regardless of how
//! recently it was read.

use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::{Clock, ResilienceSettings};

/// Derives the parameter part of a cache key
pub type KeyGenerator = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

/// Serialize parameters as a JSON array
pub fn default_key_generator(params: &[Value]) -> String {
    Value::Array(params.to_vec()).to_string()
}

/// Deterministic key `service:operation:<json params>`.
/// Identical argument sets collide; distinct ones do not.
pub fn create_cache_key(service_id: &str, operation_name: &str, params: &[Value]) -> String {
    format!("{service_id}:{operation_name}:{}", default_key_generator(params))
}

#[derive(Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Zero disables storage entirely
    pub max_size: usize,
    pub key_generator: KeyGenerator,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from_settings(&ResilienceSettings::default())
    }
}

impl CacheConfig {
    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self {
            ttl: settings.cache_ttl(),
            max_size: settings.cache_max_size,
            key_generator: Arc::new(default_key_generator),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        self.key_generator = Arc::new(generator);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) <= self.ttl
    }
}

/// Typed TTL cache with FIFO eviction
pub struct TtlCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    insertion_order: VecDeque<String>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            clock,
        }
    }

    /// Return the cached value if it is still within its TTL; stale entries are dropped
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.data.clone()),
            Some(_) => {
                tracing::debug!(key, "cache entry expired");
                self.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert `value`, evicting the earliest-inserted entry when at capacity.
    ///
    /// Overwriting an existing key never evicts; the key moves to the back of
    /// the insertion order with a fresh timestamp.
    pub fn set(&mut self, key: impl Into<String>, value: T, config: &CacheConfig) {
        if config.max_size == 0 {
            return;
        }

        let key = key.into();
        if self.entries.contains_key(&key) {
            self.remove(&key);
        } else if self.entries.len() >= config.max_size {
            if let Some(oldest) = self.insertion_order.pop_front() {
                tracing::debug!(key = %oldest, "evicting earliest-inserted cache entry");
                self.entries.remove(&oldest);
            }
        }

        self.insertion_order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                data: value,
                inserted_at: self.clock.now(),
                ttl: config.ttl,
            },
        );
    }

    /// Empty the cache, or drop only keys matching `pattern`.
    ///
    /// The pattern is a regex; an invalid regex is matched as a plain substring.
    /// Returns the number of entries removed.
    pub fn clear(&mut self, pattern: Option<&str>) -> usize {
        let Some(pattern) = pattern else {
            let removed = self.entries.len();
            self.entries.clear();
            self.insertion_order.clear();
            return removed;
        };

        let matches: Box<dyn Fn(&str) -> bool> = match Regex::new(pattern) {
            Ok(regex) => Box::new(move |key| regex.is_match(key)),
            Err(_) => {
                let needle = pattern.to_string();
                Box::new(move |key| key.contains(needle.as_str()))
            }
        };

        let before = self.entries.len();
        self.entries.retain(|key, _| !matches(key));
        let entries = &self.entries;
        self.insertion_order.retain(|key| entries.contains_key(key));
        before - self.entries.len()
    }

    /// Drop every entry past its TTL
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let entries = &self.entries;
        self.insertion_order.retain(|key| entries.contains_key(key));
        before - self.entries.len()
    }

    /// True when `key` holds a fresh entry. Does not evict.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries.get(key).is_some_and(|entry| entry.is_fresh(now))
    }

    /// Stored entries, including stale ones not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from earliest to latest inserted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.insertion_order.iter().map(String::as_str)
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.insertion_order.retain(|k| k != key);
    }
}

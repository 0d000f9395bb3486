//! Plan cache
//!
//! Plans depend only on the path, the optimization level and the provider
//! that decoded the tree, so a compiled plan is reused for every later query
//! with the same shape. Entries expire after a TTL, swept whenever the cache
//! is written; when the cache is full the least recently used entry goes.

use crate::parser::Path;
use crate::planner::{OptimizationLevel, QueryPlan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Separates path segments inside a cache key; never produced by the lexer
const KEY_SEPARATOR: char = '\u{1f}';

/// Plan cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached plans (0 disables caching)
    pub max_entries: usize,

    /// Age after which an entry is dropped on the next write
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(60 * 60),
        }
    }
}

struct CacheEntry {
    plan: Arc<QueryPlan>,
    created_at: Instant,
    use_count: AtomicU64,
    last_used: AtomicU64,
}

/// Thread-safe plan cache
pub struct PlanCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    /// Monotonic recency counter; readers bump it without the write lock
    tick: AtomicU64,
}

impl PlanCache {
    /// Create a cache with the given limits
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            tick: AtomicU64::new(0),
        }
    }

    /// Build the cache key for a path compiled at `level` for trees from `variant`
    pub fn key(variant: &str, level: OptimizationLevel, path: &Path) -> String {
        let mut key = format!("{}:{}:", variant, level.as_u8());
        for (i, segment) in path.segments().iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(segment);
        }
        key
    }

    /// Get the configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a plan, recording the reuse
    pub fn get(&self, key: &str) -> Option<Arc<QueryPlan>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|entry| {
            entry.use_count.fetch_add(1, Ordering::Relaxed);
            entry
                .last_used
                .store(self.next_tick(), Ordering::Relaxed);
            Arc::clone(&entry.plan)
        })
    }

    /// Store a plan
    ///
    /// Expired entries are swept first; if the cache is still full, the least
    /// recently used entry is evicted.
    pub fn put(&self, key: String, plan: Arc<QueryPlan>) {
        if self.config.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let before = entries.len();
        let ttl = self.config.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        let expired = before - entries.len();
        if expired > 0 {
            debug!("Plan cache swept {} expired entries", expired);
        }

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                debug!("Plan cache full, evicting {:?}", victim);
                entries.remove(&victim);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                plan,
                created_at: Instant::now(),
                use_count: AtomicU64::new(0),
                last_used: AtomicU64::new(self.next_tick()),
            },
        );
    }

    /// How many times the entry under `key` has been reused
    pub fn use_count(&self, key: &str) -> Option<u64> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .map(|entry| entry.use_count.load(Ordering::Relaxed))
    }

    /// Check whether a plan is cached under `key`
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    /// Number of cached plans
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached plan
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

//! Response cache
//!
//! The engine consumes caching through a single get-or-compute call keyed by
//! [`CacheKey`]. [`LruResponseCache`] is the bundled implementation:
//! - LRU eviction based on entry count
//! - TTL-based expiration for freshness
//! - At most one in-flight computation per key; concurrent callers for the
//!   same key wait for it and share the result
//!
//! Failed computations are never cached.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::TransportError;
use crate::request::CacheKey;
use crate::response::RawResponse;

/// Deferred computation of a response, run only on a cache miss
pub type ComputeFuture<'a> = BoxFuture<'a, Result<RawResponse, TransportError>>;

/// A value together with whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    /// The value
    pub value: T,
    /// True if no computation ran for this call
    pub hit: bool,
}

/// Get-or-compute access to cached responses
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Return the cached response for `key`, or run `compute` and cache its result
    ///
    /// Implementations must run at most one computation per key at a time.
    async fn get_or_compute<'a>(
        &'a self,
        key: CacheKey,
        compute: ComputeFuture<'a>,
    ) -> Result<Cached<Arc<RawResponse>>, TransportError>;
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for response caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable cache (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of cached responses (default: 1,000)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Time-to-live for cached responses in seconds (default: 60)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_enabled() -> bool { true }
fn default_max_entries() -> usize { 1_000 }
fn default_ttl_secs() -> u64 { 60 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    /// Set maximum entries
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Set TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// Disable caching
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// TTL as a duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ============================================================================
// LRU Response Cache
// ============================================================================

/// Response plus the instant it was stored
type Slot = Arc<OnceCell<(Arc<RawResponse>, Instant)>>;

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups served without computing
    pub hits: AtomicU64,

    /// Lookups that ran a computation
    pub misses: AtomicU64,

    /// Entries dropped to make room
    pub evictions: AtomicU64,

    /// Entries replaced after their TTL passed
    pub expirations: AtomicU64,
}

/// Filled slots under LRU control, plus slots still being computed
///
/// A pending slot only enters the LRU once it holds a value, so eviction can
/// never orphan a running computation.
struct Entries {
    filled: LruCache<CacheKey, Slot>,
    pending: HashMap<CacheKey, Slot>,
}

/// LRU cache of render responses with per-key single flight
pub struct LruResponseCache {
    config: CacheConfig,
    entries: Mutex<Entries>,
    stats: CacheStats,
}

impl LruResponseCache {
    /// Create a new response cache
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            entries: Mutex::new(Entries {
                filled: LruCache::new(capacity),
                pending: HashMap::new(),
            }),
            stats: CacheStats::default(),
        }
    }

    /// Slot for `key`: the in-flight one, a fresh filled one, or a new pending one
    fn slot(&self, key: CacheKey) -> Slot {
        let ttl = self.config.ttl();
        let mut entries = self.entries.lock();

        if let Some(slot) = entries.pending.get(&key) {
            return slot.clone();
        }

        if let Some(slot) = entries.filled.get(&key) {
            let expired = slot
                .get()
                .map_or(true, |(_, stored_at)| stored_at.elapsed() > ttl);
            if !expired {
                return slot.clone();
            }
            entries.filled.pop(&key);
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
        }

        let slot: Slot = Arc::new(OnceCell::new());
        entries.pending.insert(key, slot.clone());
        slot
    }

    /// Move a finished pending slot into the LRU, or drop it if it failed
    ///
    /// A failed slot stays pending while other callers hold it, since tokio
    /// lets the next waiter retry the computation on the same cell.
    fn settle(&self, key: CacheKey, slot: &Slot) {
        let mut entries = self.entries.lock();
        let is_pending = entries
            .pending
            .get(&key)
            .is_some_and(|pending| Arc::ptr_eq(pending, slot));
        if !is_pending {
            return;
        }

        if slot.initialized() {
            entries.pending.remove(&key);
            if let Some((old_key, _)) = entries.filled.push(key, slot.clone()) {
                if old_key != key {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        } else if Arc::strong_count(slot) <= 2 {
            // held only by the pending map and this caller
            entries.pending.remove(&key);
        }
    }

    /// Drop one cached response
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.lock().filled.pop(key);
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.filled.clear();
        entries.pending.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get number of cached entries, including in-flight ones
    pub fn entry_count(&self) -> usize {
        let entries = self.entries.lock();
        entries.filled.len() + entries.pending.len()
    }
}

#[async_trait]
impl ResponseCache for LruResponseCache {
    async fn get_or_compute<'a>(
        &'a self,
        key: CacheKey,
        compute: ComputeFuture<'a>,
    ) -> Result<Cached<Arc<RawResponse>>, TransportError> {
        if !self.config.enabled {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            let response = compute.await?;
            return Ok(Cached {
                value: Arc::new(response),
                hit: false,
            });
        }

        let slot = self.slot(key);
        let computed = AtomicBool::new(false);
        let flag = &computed;
        let result = slot
            .get_or_try_init(move || async move {
                flag.store(true, Ordering::Relaxed);
                compute.await.map(|r| (Arc::new(r), Instant::now()))
            })
            .await
            .map(|(response, _)| response.clone());
        self.settle(key, &slot);

        match result {
            Ok(response) => {
                let hit = !computed.load(Ordering::Relaxed);
                if hit {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Cached {
                    value: response,
                    hit,
                })
            }
            Err(e) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

/// Thread-safe wrapper for shared cache access
pub type SharedResponseCache = Arc<dyn ResponseCache>;

// ============================================================================
// Tests
// ============================================================================

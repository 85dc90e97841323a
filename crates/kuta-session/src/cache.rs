//! Session cache with TTL expiry and bounded size.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::session::Session;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// A fast lookup layer in front of session storage, keyed by token digest.
///
/// Implementations may fail freely: the session manager treats every error
/// as a miss and carries on against storage.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Look up a session. `Ok(None)` is a miss.
    async fn get(&self, token_hash: &str) -> CacheResult<Option<Session>>;

    /// Insert or replace a session.
    async fn set(&self, token_hash: &str, session: Session) -> CacheResult<()>;

    /// Remove one entry if present.
    async fn delete(&self, token_hash: &str) -> CacheResult<()>;

    /// Remove every entry.
    async fn clear(&self) -> CacheResult<()>;
}

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct CacheRecord {
    /// Snapshot of the session at insertion.
    session: Session,

    /// When this entry was inserted.
    cached_at: Instant,
}

impl CacheRecord {
    fn new(session: Session) -> Self {
        Self {
            session,
            cached_at: Instant::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-memory session cache.
///
/// - Entries expire `ttl` after insertion; expiry is detected on read
/// - When full, an arbitrary entry is evicted (not least-recently-used)
/// - Thread-safe access via a single `RwLock`; counters are atomics
///
/// Clones share the same underlying map and counters.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheRecord>>>,
    counters: Arc<Counters>,
    config: CacheConfig,
}

impl MemoryCache {
    /// Create a cache. Zero TTL or size fall back to the defaults.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            config: config.normalized(),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get the current number of entries, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Check for a live entry without touching counters.
    pub async fn contains(&self, token_hash: &str) -> bool {
        self.entries
            .read()
            .await
            .get(token_hash)
            .is_some_and(|record| !record.is_stale(self.config.ttl))
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let size = self.entries.read().await.len();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            size,
            ttl: self.config.ttl,
        }
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, token_hash: &str) -> CacheResult<Option<Session>> {
        {
            let entries = self.entries.read().await;
            match entries.get(token_hash) {
                None => {
                    Counters::bump(&self.counters.misses);
                    return Ok(None);
                }
                Some(record) if !record.is_stale(self.config.ttl) => {
                    Counters::bump(&self.counters.hits);
                    return Ok(Some(record.session.clone()));
                }
                Some(_) => {}
            }
        }

        // Stale entry: the read guard is gone, take the write lock and
        // re-check since another task may have replaced it in between.
        Counters::bump(&self.counters.misses);
        let mut entries = self.entries.write().await;
        let still_stale = entries
            .get(token_hash)
            .is_some_and(|record| record.is_stale(self.config.ttl));
        if still_stale {
            entries.remove(token_hash);
            Counters::bump(&self.counters.evictions);
            trace!(cache_size = entries.len(), "evicted stale cache entry");
        }

        Ok(None)
    }

    async fn set(&self, token_hash: &str, session: Session) -> CacheResult<()> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(token_hash) && entries.len() >= self.config.max_size {
            let victim = entries.keys().next().cloned();
            if let Some(victim) = victim {
                entries.remove(&victim);
                Counters::bump(&self.counters.evictions);
                debug!(
                    max_size = self.config.max_size,
                    "cache full, evicted an entry to make room"
                );
            }
        }

        entries.insert(token_hash.to_string(), CacheRecord::new(session));
        Counters::bump(&self.counters.sets);

        trace!(cache_size = entries.len(), "session cached");
        Ok(())
    }

    async fn delete(&self, token_hash: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(token_hash).is_some() {
            Counters::bump(&self.counters.deletes);
        }
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        self.counters.deletes.fetch_add(removed, Ordering::Relaxed);

        debug!(removed, "session cache cleared");
        Ok(())
    }
}

/// Cache statistics.
///
/// Every field but `size` is a counter that only grows for the lifetime of
/// the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,

    /// Current number of entries.
    pub size: usize,

    /// Configured time-to-live.
    pub ttl: Duration,
}

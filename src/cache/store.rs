//! Tag cache implementation
//!
//! In-memory cache keyed by [`CacheTag`], with TTL, stale fallback and
//! generation-checked writes.

use super::{CacheConfig, CacheTag, Mutation};
use crate::types::Result;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A cached entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized JSON of the cached view
    pub data: Vec<u8>,
    /// When this entry was created
    pub created_at: Instant,
    /// When this entry expires
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Check if this entry has expired
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Expired, but still inside the stale window
    fn is_servable_stale(&self, grace: Duration) -> bool {
        Instant::now() < self.expires_at + grace
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stale_served: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory tag-keyed cache
pub struct TagCache {
    /// The cache storage: tag key -> entry
    entries: DashMap<String, CacheEntry>,
    /// Invalidation generation per tag key
    generations: DashMap<String, u64>,
    /// Configuration
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    stale_served: AtomicU64,
    invalidations: AtomicU64,
}

impl TagCache {
    /// Create a new cache with configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Get a fresh entry. Expired entries stay in place for stale fallback.
    pub fn get(&self, tag: &CacheTag) -> Option<CacheEntry> {
        let key = tag.key();
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(tag = %key, "Cache hit");
                return Some(entry.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(tag = %key, "Cache miss");
        None
    }

    fn get_stale(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_servable_stale(self.config.stale_grace))
            .map(|entry| entry.clone())
    }

    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).map(|g| *g).unwrap_or(0)
    }

    /// Store an entry with explicit TTL
    pub fn set(&self, tag: &CacheTag, data: Vec<u8>, ttl: Duration) {
        let key = tag.key();
        debug!(tag = %key, ttl_secs = ttl.as_secs(), "Cache set");
        self.entries.insert(key, CacheEntry::new(data, ttl));
        self.maybe_evict();
    }

    /// Store only if the tag was not invalidated since `generation` was read.
    ///
    /// A value computed before a write must not repopulate the cache after
    /// that write invalidated it.
    fn set_if_current(&self, key: &str, generation: u64, data: Vec<u8>, ttl: Duration) -> bool {
        let stored = match self.generations.get(key) {
            Some(current) if *current != generation => false,
            _ => {
                self.entries
                    .insert(key.to_string(), CacheEntry::new(data, ttl));
                true
            }
        };
        if stored {
            debug!(tag = %key, ttl_secs = ttl.as_secs(), "Cache set");
            self.maybe_evict();
        } else {
            debug!(tag = %key, "Discarding value computed before invalidation");
        }
        stored
    }

    /// Return the cached value for `tag`, computing and caching it on a miss.
    ///
    /// If the computation fails with a retryable error and an expired entry
    /// is still inside the stale window, the stale value is returned instead.
    pub async fn get_or_compute<T, F, Fut>(&self, tag: &CacheTag, ttl: Duration, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = tag.key();
        if let Some(entry) = self.get(tag) {
            match serde_json::from_slice(&entry.data) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(tag = %key, error = %e, "Dropping undecodable cache entry");
                    self.entries.remove(&key);
                }
            }
        }

        let generation = self.generation(&key);
        match compute().await {
            Ok(value) => {
                let data = serde_json::to_vec(&value)?;
                self.set_if_current(&key, generation, data, ttl);
                Ok(value)
            }
            Err(err) if err.is_retryable() => {
                if let Some(stale) = self.get_stale(&key) {
                    if let Ok(value) = serde_json::from_slice(&stale.data) {
                        self.stale_served.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            tag = %key,
                            error = %err,
                            age_secs = stale.created_at.elapsed().as_secs(),
                            "Serving stale cache entry after upstream failure"
                        );
                        return Ok(value);
                    }
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop the given tags, including any stale copies
    pub fn invalidate(&self, tags: &[CacheTag]) -> usize {
        let mut removed = 0;
        for tag in tags {
            let key = tag.key();
            *self.generations.entry(key.clone()).or_insert(0) += 1;
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.invalidations.fetch_add(tags.len() as u64, Ordering::Relaxed);
        debug!(tags = tags.len(), removed = removed, "Invalidated cache tags");
        removed
    }

    /// Invalidate every tag mapped to a mutation
    pub fn apply_mutation(&self, mutation: &Mutation) -> usize {
        let tags = mutation.tags();
        let removed = self.invalidate(&tags);
        info!(
            mutation = mutation.name(),
            tags = ?tags.iter().map(CacheTag::key).collect::<Vec<_>>(),
            removed = removed,
            "Applied cache invalidation"
        );
        removed
    }

    /// Whether a fresh entry exists for a tag
    pub fn contains(&self, tag: &CacheTag) -> bool {
        self.entries
            .get(&tag.key())
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.clear();
        info!("Cache cleared");
    }

    /// Remove entries past their stale window
    pub fn cleanup(&self) -> usize {
        let grace = self.config.stale_grace;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_servable_stale(grace))
            .map(|entry| entry.key().clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
        }

        if count > 0 {
            debug!(count = count, "Cleaned up expired cache entries");
        }
        count
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Evict entries if over capacity (oldest first)
    fn maybe_evict(&self) {
        if self.entries.len() <= self.config.max_entries {
            return;
        }

        let to_evict = self.entries.len() - self.config.max_entries;

        let mut entries: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.created_at))
            .collect();

        entries.sort_by_key(|(_, created)| *created);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        debug!(evicted = to_evict, "Evicted cache entries");
    }
}

impl Default for TagCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn a background task to periodically cleanup expired entries
pub fn spawn_cleanup_task(cache: Arc<TagCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.entries,
                hit_rate = format!("{:.1}%", stats.hit_rate()),
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}

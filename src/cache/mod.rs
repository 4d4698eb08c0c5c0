//! Caching layer for Podium
//!
//! Ranking views are computed lazily on read and cached under a fixed tag
//! with a per-view TTL. Concurrent misses may compute the same view twice;
//! the computation is pure, so whichever finishes last simply overwrites.
//!
//! Writes never touch cache entries directly. They name a [`Mutation`], and
//! the cache drops exactly the tags listed for it in [`Mutation::tags`].

pub mod store;
pub mod tags;

pub use store::{spawn_cleanup_task, CacheEntry, CacheStats, TagCache};
pub use tags::{CacheTag, Mutation};

use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub max_entries: usize,
    /// TTL for the decision-free ranking view
    pub basic_ttl: Duration,
    /// TTL for the top-N reward view
    pub top_ttl: Duration,
    /// TTL for the snapshot view
    pub snapshot_ttl: Duration,
    /// TTL for per-identity decision entries
    pub decision_ttl: Duration,
    /// Window after expiry in which an entry may still be served if
    /// recomputation fails because upstream is unavailable
    pub stale_grace: Duration,
    /// Cleanup interval
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            basic_ttl: Duration::from_secs(60),       // 1 minute
            top_ttl: Duration::from_secs(300),        // 5 minutes
            snapshot_ttl: Duration::from_secs(3600),  // 1 hour
            decision_ttl: Duration::from_secs(60),    // 1 minute
            stale_grace: Duration::from_secs(900),    // 15 minutes
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// TTL for a tag
    pub fn ttl_for(&self, tag: &CacheTag) -> Duration {
        match tag {
            CacheTag::RankingBasic => self.basic_ttl,
            CacheTag::RankingTop => self.top_ttl,
            CacheTag::SnapshotProfiles => self.snapshot_ttl,
            CacheTag::Decision(_) => self.decision_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 10_000);
        assert!(config.ttl_for(&CacheTag::RankingBasic) < config.ttl_for(&CacheTag::RankingTop));
        assert_eq!(config.ttl_for(&CacheTag::SnapshotProfiles), Duration::from_secs(3600));
    }
}

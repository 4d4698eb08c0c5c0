//! Live leaderboard
//!
//! Composes score source, ranking, boosts and the decision overlay behind the
//! tag cache. Two views are cached:
//! - `ranking-basic`: the full ranked list with boosts, no decisions
//! - `ranking-top200`: the rewarded top-N entries with decisions applied
//!
//! Rows beyond the cutoff are overlaid on demand; they never carry a reward.
//!
//! The two views expire independently, so every read checks that the top
//! view was built from the ranking it is paired with and rebuilds it if not.
//! The reward split always runs over the whole rewarded prefix.

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::boost::BoostEngine;
use crate::cache::{CacheTag, Mutation, TagCache};
use crate::decisions::DecisionService;
use crate::ranking::rank_and_boost;
use crate::rewards::RewardCalculator;
use crate::store::{bounded, ScoreSource};
use crate::types::{LeaderboardEntry, LeaderboardPage, RankedScore, Result};

/// Largest page the read surface returns
pub const MAX_PAGE_LIMIT: usize = 200;

pub struct LeaderboardService {
    scores: Arc<dyn ScoreSource>,
    decisions: Arc<DecisionService>,
    boost: BoostEngine,
    rewards: RewardCalculator,
    cache: Arc<TagCache>,
    timeout: Duration,
}

impl LeaderboardService {
    pub fn new(
        scores: Arc<dyn ScoreSource>,
        decisions: Arc<DecisionService>,
        rewards: RewardCalculator,
        cache: Arc<TagCache>,
        timeout: Duration,
    ) -> Self {
        let boost = BoostEngine::new(rewards.config().boost.clone());
        Self {
            scores,
            decisions,
            boost,
            rewards,
            cache,
            timeout,
        }
    }

    pub fn rewards(&self) -> &RewardCalculator {
        &self.rewards
    }

    /// Full decision-free ranking, cached under `ranking-basic`
    pub async fn ranked_scores(&self) -> Result<Vec<RankedScore>> {
        let tag = CacheTag::RankingBasic;
        let ttl = self.cache.config().ttl_for(&tag);
        self.cache
            .get_or_compute(&tag, ttl, || self.compute_ranked_scores())
            .await
    }

    /// Rewarded top-N entries, cached under `ranking-top200`
    pub async fn top_entries(&self) -> Result<Vec<LeaderboardEntry>> {
        let tag = CacheTag::RankingTop;
        let ttl = self.cache.config().ttl_for(&tag);
        self.cache
            .get_or_compute(&tag, ttl, || async {
                let ranked = self.ranked_scores().await?;
                self.overlay_top(&ranked).await
            })
            .await
    }

    /// Top-N entries computed from the source and the store, bypassing every cache
    pub async fn compute_top_entries_fresh(&self) -> Result<(Vec<LeaderboardEntry>, u64)> {
        let ranked = self.compute_ranked_scores().await?;
        let total = ranked.len() as u64;
        let entries = self.overlay_top(&ranked).await?;
        Ok((entries, total))
    }

    /// One page of the live leaderboard. `limit` is clamped to `1..=200`.
    pub async fn page(&self, offset: usize, limit: usize) -> Result<LeaderboardPage> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let ranked = self.ranked_scores().await?;
        let total_count = ranked.len();
        let end = offset.saturating_add(limit).min(total_count);

        let entries = if offset >= total_count {
            Vec::new()
        } else {
            let cutoff = self.rewarded_len(&ranked);
            let mut entries = Vec::with_capacity(end - offset);
            if offset < cutoff {
                let top = self.top_entries_for(&ranked).await?;
                entries.extend(top.into_iter().skip(offset).take(end.min(cutoff) - offset));
            }
            let tail_start = offset.max(cutoff);
            if tail_start < end {
                entries.extend(self.overlay_tail(&ranked[tail_start..end]).await?);
            }
            entries
        };

        debug!(offset = offset, limit = limit, returned = entries.len(), total = total_count, "Served leaderboard page");
        Ok(LeaderboardPage {
            entries,
            offset,
            limit,
            total_count,
        })
    }

    /// Live entry for one identity, if it is ranked
    pub async fn live_entry(&self, identity: Uuid) -> Result<Option<LeaderboardEntry>> {
        let ranked = self.ranked_scores().await?;
        let Some(pos) = ranked.iter().position(|r| r.identity.id == identity) else {
            return Ok(None);
        };

        if pos < self.rewarded_len(&ranked) {
            let top = self.top_entries_for(&ranked).await?;
            return Ok(top.into_iter().nth(pos));
        }

        let decision = self.decisions.get(identity).await?;
        let decisions = HashMap::from([(identity, decision)]);
        let mut entries = self.rewards.overlay(&ranked[pos..=pos], &decisions);
        Ok(entries.pop())
    }

    /// Cached top view, rebuilt if it was computed from a different ranking
    /// than `ranked`
    async fn top_entries_for(&self, ranked: &[RankedScore]) -> Result<Vec<LeaderboardEntry>> {
        let prefix = &ranked[..self.rewarded_len(ranked)];
        let top = self.top_entries().await?;
        if built_from(&top, prefix) {
            return Ok(top);
        }

        debug!(cached = top.len(), current = prefix.len(), "Top view predates ranking; rebuilding");
        let tag = CacheTag::RankingTop;
        let ttl = self.cache.config().ttl_for(&tag);
        self.cache.invalidate(&[tag.clone()]);
        let rebuilt = self
            .cache
            .get_or_compute(&tag, ttl, || self.overlay_top(ranked))
            .await?;
        if built_from(&rebuilt, prefix) {
            return Ok(rebuilt);
        }

        // Another reader cached a different ranking in between
        self.overlay_top(ranked).await
    }

    /// Drop the cached rankings so the next read refetches scores
    pub fn refresh_scores(&self) -> usize {
        let dropped = self.cache.apply_mutation(&Mutation::ScoresRefreshed);
        info!(dropped = dropped, "Score refresh requested");
        dropped
    }

    async fn compute_ranked_scores(&self) -> Result<Vec<RankedScore>> {
        let records = bounded("score source", self.timeout, self.scores.fetch_scores()).await?;
        let fetched = records.len();
        let ranked = rank_and_boost(records, &self.boost);
        info!(fetched = fetched, ranked = ranked.len(), "Computed ranking");
        Ok(ranked)
    }

    async fn overlay_top(&self, ranked: &[RankedScore]) -> Result<Vec<LeaderboardEntry>> {
        let top = &ranked[..self.rewarded_len(ranked)];
        let ids: Vec<Uuid> = top.iter().map(|r| r.identity.id).collect();
        let decisions = self.decisions.get_many(&ids).await?;
        Ok(self.rewards.overlay(top, &decisions))
    }

    async fn overlay_tail(&self, ranked: &[RankedScore]) -> Result<Vec<LeaderboardEntry>> {
        let ids: Vec<Uuid> = ranked.iter().map(|r| r.identity.id).collect();
        let decisions = self.decisions.get_many(&ids).await?;
        Ok(self.rewards.overlay(ranked, &decisions))
    }

    /// Number of leading entries inside the reward cutoff
    fn rewarded_len(&self, ranked: &[RankedScore]) -> usize {
        let slots = self.rewards.config().reward_slots;
        ranked.partition_point(|r| r.rank <= slots)
    }
}

/// Whether `entries` were overlaid onto exactly this rewarded prefix
fn built_from(entries: &[LeaderboardEntry], prefix: &[RankedScore]) -> bool {
    entries.len() == prefix.len()
        && entries.iter().zip(prefix).all(|(e, r)| {
            e.identity == r.identity
                && e.rank == r.rank
                && e.raw_score == r.raw_score
                && e.boost_multiplier == r.boost_multiplier
                && e.active_boosts == r.active_boosts
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::config::ProgramConfig;
    use crate::store::{MemoryPreferenceStore, StaticScoreSource};
    use crate::types::{BoostInputs, Identity, RewardDecision, ScoreRecord};
    use chrono::Utc;

    fn record(n: u128, score: f64) -> ScoreRecord {
        ScoreRecord {
            identity: Identity::new(Uuid::from_u128(n)),
            raw_score: score,
            computed_at: Some(Utc::now()),
            is_calculating: false,
            boost: BoostInputs::default(),
        }
    }

    fn service(records: Vec<ScoreRecord>, slots: u32) -> (LeaderboardService, Arc<StaticScoreSource>, Arc<DecisionService>) {
        service_with(records, slots, CacheConfig::default())
    }

    fn service_with(
        records: Vec<ScoreRecord>,
        slots: u32,
        cache_config: CacheConfig,
    ) -> (LeaderboardService, Arc<StaticScoreSource>, Arc<DecisionService>) {
        let cache = Arc::new(TagCache::new(cache_config));
        let source = Arc::new(StaticScoreSource::new(records));
        let decisions = Arc::new(DecisionService::new(
            Arc::new(MemoryPreferenceStore::new()),
            Arc::clone(&cache),
            Duration::from_secs(1),
        ));
        let rewards = RewardCalculator::from_config(ProgramConfig {
            pool_total: 100.0,
            reward_slots: slots,
            ..ProgramConfig::default()
        });
        let svc = LeaderboardService::new(
            source.clone(),
            Arc::clone(&decisions),
            rewards,
            cache,
            Duration::from_secs(1),
        );
        (svc, source, decisions)
    }

    #[tokio::test]
    async fn test_page_spans_cutoff() {
        let records = (1..=5).map(|n| record(n, 100.0 - n as f64)).collect();
        let (svc, _, decisions) = service(records, 2);
        for n in 1..=5 {
            decisions
                .put(Uuid::from_u128(n), RewardDecision::OptedIn, None, Utc::now())
                .await
                .unwrap();
        }

        let page = svc.page(1, 3).await.unwrap();
        assert_eq!(page.total_count, 5);
        let ranks: Vec<u32> = page.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![2, 3, 4]);
        assert_eq!(page.entries[0].base_reward, 50.0);
        assert_eq!(page.entries[1].base_reward, 0.0);
        assert_eq!(page.entries[1].decision, RewardDecision::OptedIn);
    }

    #[tokio::test]
    async fn test_page_limit_clamped() {
        let records = (1..=3).map(|n| record(n, n as f64)).collect();
        let (svc, _, _) = service(records, 200);
        assert_eq!(svc.page(0, 0).await.unwrap().limit, 1);
        assert_eq!(svc.page(0, 10_000).await.unwrap().limit, MAX_PAGE_LIMIT);
        assert!(svc.page(50, 10).await.unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_scores() {
        let (svc, source, _) = service(vec![record(1, 10.0)], 200);
        assert_eq!(svc.ranked_scores().await.unwrap().len(), 1);

        source.replace(vec![record(1, 10.0), record(2, 20.0)]);
        // Still cached
        assert_eq!(svc.ranked_scores().await.unwrap().len(), 1);

        svc.refresh_scores();
        let ranked = svc.ranked_scores().await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].identity.id, Uuid::from_u128(2));
    }

    #[tokio::test]
    async fn test_live_entry_sees_own_write() {
        let (svc, _, decisions) = service(vec![record(1, 10.0), record(2, 5.0)], 200);
        let id = Uuid::from_u128(2);
        assert_eq!(svc.live_entry(id).await.unwrap().unwrap().base_reward, 0.0);

        decisions.put(id, RewardDecision::OptedIn, None, Utc::now()).await.unwrap();
        let entry = svc.live_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.decision, RewardDecision::OptedIn);
        assert_eq!(entry.base_reward, 100.0);

        assert!(svc.live_entry(Uuid::from_u128(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_basic_view_expiring_before_top_stays_within_pool() {
        let (svc, source, decisions) = service_with(
            vec![record(1, 10.0)],
            200,
            CacheConfig {
                basic_ttl: Duration::from_millis(20),
                top_ttl: Duration::from_secs(300),
                ..CacheConfig::default()
            },
        );
        let (first, second) = (Uuid::from_u128(1), Uuid::from_u128(2));
        for id in [first, second] {
            decisions.put(id, RewardDecision::OptedIn, None, Utc::now()).await.unwrap();
        }
        assert_eq!(svc.page(0, 10).await.unwrap().entries[0].base_reward, 100.0);

        source.replace(vec![record(1, 10.0), record(2, 20.0)]);
        tokio::time::sleep(Duration::from_millis(60)).await;

        let newcomer = svc.live_entry(second).await.unwrap().unwrap();
        let incumbent = svc.live_entry(first).await.unwrap().unwrap();
        assert_eq!((newcomer.rank, incumbent.rank), (1, 2));
        assert!(newcomer.base_reward + incumbent.base_reward <= 100.0);

        let page = svc.page(0, 10).await.unwrap();
        let ids: Vec<Uuid> = page.entries.iter().map(|e| e.identity.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(page.total_count, 2);
        assert!(page.entries.iter().map(|e| e.base_reward).sum::<f64>() <= 100.0);
        assert_eq!(page.entries[0], newcomer);
    }
}

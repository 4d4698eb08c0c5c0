//! Read/write surface
//!
//! Wires the services together over a set of store adapters and exposes the
//! operations the HTTP gateway serves.

use futures::future;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheStats, TagCache};
use crate::config::ProgramConfig;
use crate::decisions::{DecisionRequest, DecisionService};
use crate::leaderboard::{Clock, LeaderboardService};
use crate::rewards::RewardCalculator;
use crate::snapshot::SnapshotService;
use crate::store::{PreferenceStore, ScoreSource, SnapshotStore};
use crate::types::{DecisionRecord, LeaderboardPage, PodiumError, Result, Snapshot, SnapshotSummary, Standing};

/// Store adapters the surface runs on
pub struct Stores {
    pub scores: Arc<dyn ScoreSource>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

/// Snapshot payload returned to readers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub summary: SnapshotSummary,
    pub snapshot: Snapshot,
}

pub struct Podium {
    leaderboard: Arc<LeaderboardService>,
    decisions: Arc<DecisionService>,
    snapshots: SnapshotService,
    cache: Arc<TagCache>,
    clock: Arc<dyn Clock>,
}

impl Podium {
    pub fn new(
        program: ProgramConfig,
        stores: Stores,
        cache: Arc<TagCache>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        info!(
            program = %program.program_id,
            pool = program.pool_total,
            slots = program.reward_slots,
            curve = ?program.curve,
            redistribution = ?program.redistribution,
            deadline = %program.deadline.to_rfc3339(),
            "Program configured"
        );

        let decisions = Arc::new(DecisionService::new(stores.preferences, Arc::clone(&cache), timeout));
        let leaderboard = Arc::new(LeaderboardService::new(
            stores.scores,
            Arc::clone(&decisions),
            RewardCalculator::from_config(program),
            Arc::clone(&cache),
            timeout,
        ));
        let snapshots = SnapshotService::new(
            stores.snapshots,
            Arc::clone(&leaderboard),
            Arc::clone(&cache),
            timeout,
        );

        Self {
            leaderboard,
            decisions,
            snapshots,
            cache,
            clock,
        }
    }

    pub fn program(&self) -> &ProgramConfig {
        self.leaderboard.rewards().config()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn page(&self, offset: usize, limit: usize) -> Result<LeaderboardPage> {
        self.leaderboard.page(offset, limit).await
    }

    /// Live and frozen entries for one identity. NotFound if it has neither.
    pub async fn standing(&self, identity: Uuid) -> Result<Standing> {
        let (live, snapshot_captured) =
            future::try_join(self.leaderboard.live_entry(identity), self.snapshots.exists()).await?;
        let snapshot = if snapshot_captured {
            self.snapshots.entry_for(identity).await?
        } else {
            None
        };

        if live.is_none() && snapshot.is_none() {
            return Err(PodiumError::NotFound(format!("{} is not ranked", identity)));
        }

        Ok(Standing {
            identity,
            live,
            snapshot,
            snapshot_captured,
        })
    }

    pub async fn snapshot(&self) -> Result<SnapshotView> {
        let snapshot = self.snapshots.read().await?;
        Ok(SnapshotView {
            summary: snapshot.summary(),
            snapshot,
        })
    }

    pub async fn snapshot_exists(&self) -> Result<bool> {
        self.snapshots.exists().await
    }

    pub async fn decision(&self, identity: Uuid) -> Result<DecisionRecord> {
        self.decisions.get(identity).await
    }

    pub async fn submit_decision(&self, identity: Uuid, request: DecisionRequest) -> Result<DecisionRecord> {
        self.decisions.submit(identity, request, self.clock.now()).await
    }

    pub async fn create_snapshot(&self) -> Result<SnapshotSummary> {
        self.snapshots.create(self.clock.now()).await
    }

    pub fn refresh_scores(&self) -> usize {
        self.leaderboard.refresh_scores()
    }
}

//! Payout snapshot
//!
//! `NoSnapshot -> Captured`, once per program. Creation is refused before the
//! deadline, recomputes the decided top-N without touching any cache, and is
//! closed against races twice: an in-process mutex serializes local callers,
//! and the store's conditional insert settles races between processes.

use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheTag, Mutation, TagCache};
use crate::leaderboard::LeaderboardService;
use crate::store::{bounded, CreateOutcome, SnapshotStore};
use crate::types::{LeaderboardEntry, PodiumError, Result, Snapshot, SnapshotSummary};

pub struct SnapshotService {
    store: Arc<dyn SnapshotStore>,
    leaderboard: Arc<LeaderboardService>,
    cache: Arc<TagCache>,
    create_lock: Mutex<()>,
    timeout: Duration,
}

impl SnapshotService {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        leaderboard: Arc<LeaderboardService>,
        cache: Arc<TagCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            leaderboard,
            cache,
            create_lock: Mutex::new(()),
            timeout,
        }
    }

    /// Capture the snapshot. See the module docs for the order of checks.
    pub async fn create(&self, now: DateTime<Utc>) -> Result<SnapshotSummary> {
        let config = self.leaderboard.rewards().config();
        if now < config.deadline {
            return Err(PodiumError::Validation(format!(
                "program '{}' closes at {}; snapshot not allowed yet",
                config.program_id,
                config.deadline.to_rfc3339()
            )));
        }

        let _guard = self.create_lock.lock().await;

        if self.exists().await? {
            return Err(PodiumError::Conflict(format!(
                "snapshot for program '{}' already captured",
                config.program_id
            )));
        }

        let (entries, total_count) = self.leaderboard.compute_top_entries_fresh().await?;
        let entries: Vec<LeaderboardEntry> = entries
            .into_iter()
            .filter(|e| e.rank <= config.reward_slots)
            .collect();
        if entries.is_empty() {
            return Err(PodiumError::Validation(
                "no ranked participants; refusing to capture an empty snapshot".into(),
            ));
        }

        // Stores keep millisecond timestamps; capture at that precision so
        // the stored snapshot reads back exactly as it was built.
        let snapshot = Snapshot {
            program_id: config.program_id.clone(),
            captured_at: now.trunc_subsecs(3),
            entries,
            total_count,
        };

        match bounded("snapshot store write", self.timeout, self.store.try_create(&snapshot)).await? {
            CreateOutcome::Created => {
                let dropped = self.cache.apply_mutation(&Mutation::SnapshotCreated);
                let summary = snapshot.summary();
                info!(
                    program = %summary.program_id,
                    entries = summary.entry_count,
                    opted_in = summary.opted_in_count,
                    total_count = summary.total_count,
                    base_total = summary.total_base_reward,
                    invalidated = dropped,
                    "Snapshot captured"
                );
                Ok(summary)
            }
            CreateOutcome::Conflict => {
                warn!(program = %config.program_id, "Lost snapshot race to another writer");
                Err(PodiumError::Conflict(format!(
                    "snapshot for program '{}' already captured",
                    config.program_id
                )))
            }
        }
    }

    pub async fn exists(&self) -> Result<bool> {
        bounded("snapshot store read", self.timeout, self.store.exists()).await
    }

    /// The captured snapshot, cached under `ranking-snapshot-profiles`
    pub async fn read(&self) -> Result<Snapshot> {
        let tag = CacheTag::SnapshotProfiles;
        let ttl = self.cache.config().ttl_for(&tag);
        self.cache
            .get_or_compute(&tag, ttl, || async {
                bounded("snapshot store read", self.timeout, self.store.read())
                    .await?
                    .ok_or_else(|| PodiumError::NotFound("no snapshot has been captured".into()))
            })
            .await
    }

    /// Frozen entry for one identity; `None` before capture or if not included
    pub async fn entry_for(&self, identity: Uuid) -> Result<Option<LeaderboardEntry>> {
        match self.read().await {
            Ok(snapshot) => Ok(snapshot.entry_for(identity).cloned()),
            Err(PodiumError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

//! In-memory adapters
//!
//! Used in dev mode and by tests. The snapshot store relies on `OnceLock` for
//! its conditional insert, so concurrent creates resolve to a single winner.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tracing::debug;
use uuid::Uuid;

use super::{CreateOutcome, PreferenceStore, ScoreSource, SnapshotStore};
use crate::types::{DecisionRecord, PodiumError, Result, RewardDecision, ScoreRecord, Snapshot};

/// Score source serving fixed pages
#[derive(Debug, Default)]
pub struct StaticScoreSource {
    pages: Mutex<Vec<Vec<ScoreRecord>>>,
}

impl StaticScoreSource {
    /// Single page holding every record
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self::paged(vec![records])
    }

    pub fn paged(pages: Vec<Vec<ScoreRecord>>) -> Self {
        Self {
            pages: Mutex::new(pages),
        }
    }

    /// Replace the served records, as an upstream recompute would
    pub fn replace(&self, records: Vec<ScoreRecord>) {
        if let Ok(mut pages) = self.pages.lock() {
            *pages = vec![records];
        }
    }
}

#[async_trait::async_trait]
impl ScoreSource for StaticScoreSource {
    async fn fetch_scores(&self) -> Result<Vec<ScoreRecord>> {
        let pages = self
            .pages
            .lock()
            .map_err(|_| PodiumError::Internal("score pages lock poisoned".into()))?;
        let records: Vec<ScoreRecord> = pages.iter().flatten().cloned().collect();
        debug!(pages = pages.len(), records = records.len(), "Served static score pages");
        Ok(records)
    }
}

/// Decision store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    decisions: DashMap<Uuid, DecisionRecord>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_decision(&self, identity: Uuid) -> Result<DecisionRecord> {
        Ok(self
            .decisions
            .get(&identity)
            .map(|d| d.clone())
            .unwrap_or_else(|| DecisionRecord::undecided(identity)))
    }

    async fn get_decisions(&self, identities: &[Uuid]) -> Result<HashMap<Uuid, DecisionRecord>> {
        Ok(identities
            .iter()
            .filter_map(|id| self.decisions.get(id).map(|d| (*id, d.clone())))
            .collect())
    }

    async fn put_decision(
        &self,
        identity: Uuid,
        decision: RewardDecision,
        wallet: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionRecord> {
        let record = DecisionRecord {
            identity,
            decision,
            decided_at: Some(decided_at),
            primary_wallet_address: wallet,
        };
        self.decisions.insert(identity, record.clone());
        Ok(record)
    }
}

/// Snapshot store holding at most one snapshot
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slot: OnceLock<Snapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn try_create(&self, snapshot: &Snapshot) -> Result<CreateOutcome> {
        match self.slot.set(snapshot.clone()) {
            Ok(()) => Ok(CreateOutcome::Created),
            Err(_) => Ok(CreateOutcome::Conflict),
        }
    }

    async fn read(&self) -> Result<Option<Snapshot>> {
        Ok(self.slot.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(program: &str) -> Snapshot {
        Snapshot {
            program_id: program.into(),
            captured_at: Utc::now(),
            entries: Vec::new(),
            total_count: 0,
        }
    }

    #[tokio::test]
    async fn test_preference_read_after_write() {
        let store = MemoryPreferenceStore::new();
        let id = Uuid::new_v4();

        let before = store.get_decision(id).await.unwrap();
        assert_eq!(before.decision, RewardDecision::Undecided);
        assert!(before.decided_at.is_none());

        store
            .put_decision(id, RewardDecision::OptedIn, Some("0xabc".into()), Utc::now())
            .await
            .unwrap();
        let after = store.get_decision(id).await.unwrap();
        assert_eq!(after.decision, RewardDecision::OptedIn);
        assert_eq!(after.primary_wallet_address.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_get_decisions_omits_missing() {
        let store = MemoryPreferenceStore::new();
        let known = Uuid::new_v4();
        store
            .put_decision(known, RewardDecision::OptedOut, None, Utc::now())
            .await
            .unwrap();

        let found = store.get_decisions(&[known, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&known].decision, RewardDecision::OptedOut);
    }

    #[tokio::test]
    async fn test_snapshot_second_create_conflicts() {
        let store = MemorySnapshotStore::new();
        assert!(!store.exists().await.unwrap());
        assert_eq!(store.try_create(&snapshot("a")).await.unwrap(), CreateOutcome::Created);
        assert_eq!(store.try_create(&snapshot("b")).await.unwrap(), CreateOutcome::Conflict);
        assert_eq!(store.read().await.unwrap().unwrap().program_id, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_have_one_winner() {
        let store = Arc::new(MemorySnapshotStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.try_create(&snapshot(&format!("p{}", i))).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() == CreateOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_static_source_flattens_pages() {
        let source = StaticScoreSource::paged(vec![Vec::new(), Vec::new()]);
        assert!(source.fetch_scores().await.unwrap().is_empty());
    }
}

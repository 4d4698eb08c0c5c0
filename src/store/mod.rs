//! External collaborators
//!
//! The core only talks to scores, decisions and snapshots through these
//! traits. Adapters:
//! - [`http::HttpScoreSource`] and [`memory::StaticScoreSource`] for scores
//! - [`mongo::MongoPreferenceStore`] and [`memory::MemoryPreferenceStore`] for decisions
//! - [`mongo::MongoSnapshotStore`] and [`memory::MemorySnapshotStore`] for the snapshot

pub mod http;
pub mod memory;
pub mod mongo;

pub use http::{HttpScoreSource, ScorePage};
pub use memory::{MemoryPreferenceStore, MemorySnapshotStore, StaticScoreSource};
pub use mongo::{MongoPreferenceStore, MongoSnapshotStore};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::types::{DecisionRecord, PodiumError, Result, RewardDecision, ScoreRecord, Snapshot};

/// Upstream score data
#[async_trait::async_trait]
pub trait ScoreSource: Send + Sync {
    /// Every score record, with pagination fully drained
    async fn fetch_scores(&self) -> Result<Vec<ScoreRecord>>;
}

/// Key-value store of reward decisions
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Decision for one identity; `undecided` if none was ever written
    async fn get_decision(&self, identity: Uuid) -> Result<DecisionRecord>;

    /// Stored decisions for many identities; missing identities are omitted
    async fn get_decisions(&self, identities: &[Uuid]) -> Result<HashMap<Uuid, DecisionRecord>>;

    /// Persist a decision (last write wins) and return what was stored
    async fn put_decision(
        &self,
        identity: Uuid,
        decision: RewardDecision,
        wallet: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionRecord>;
}

/// Result of a conditional snapshot insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    Conflict,
}

/// Persistent home of the single payout snapshot
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Atomically persist `snapshot` unless one already exists for its program
    async fn try_create(&self, snapshot: &Snapshot) -> Result<CreateOutcome>;

    /// The stored snapshot, if any
    async fn read(&self) -> Result<Option<Snapshot>>;

    async fn exists(&self) -> Result<bool> {
        Ok(self.read().await?.is_some())
    }
}

/// Run an external call under a timeout; elapsed becomes `UpstreamUnavailable`
pub async fn bounded<T, F>(what: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PodiumError::UpstreamUnavailable(format!(
            "{} timed out after {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        match result {
            Err(PodiumError::UpstreamUnavailable(msg)) => assert!(msg.contains("slow call")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_bounded_passes_through() {
        let value = tokio_test::block_on(bounded("fast call", Duration::from_secs(1), async {
            Ok(5u8)
        }))
        .unwrap();
        assert_eq!(value, 5);
    }
}

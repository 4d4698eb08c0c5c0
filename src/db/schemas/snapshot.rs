//! Snapshot document schema
//!
//! The unique index on `program_id` is what makes snapshot creation a single
//! atomic conditional write: a second insert for the same program fails with
//! a duplicate-key error.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boost::BoostSignal;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::{Identity, LeaderboardEntry, PodiumError, Snapshot};

/// Collection name for snapshots
pub const SNAPSHOT_COLLECTION: &str = "reward_snapshots";

/// Snapshot document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SnapshotDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Program instance this snapshot closes
    pub program_id: String,

    pub captured_at: bson::DateTime,

    /// Ranked participants at capture time
    pub total_count: i64,

    /// Rewarded entries in rank order
    pub entries: Vec<SnapshotEntryDoc>,
}

/// One frozen leaderboard row
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SnapshotEntryDoc {
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    pub rank: i64,
    pub raw_score: f64,
    pub boost_multiplier: f64,
    #[serde(default)]
    pub active_boosts: Vec<String>,
    pub effective_score_for_sort: f64,
    pub decision: String,
    pub base_reward: f64,
    pub boosted_reward: f64,
}

impl From<&LeaderboardEntry> for SnapshotEntryDoc {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            identity: entry.identity.id.to_string(),
            handle: entry.identity.handle.clone(),
            wallet_address: entry.identity.wallet_address.clone(),
            rank: entry.rank as i64,
            raw_score: entry.raw_score,
            boost_multiplier: entry.boost_multiplier,
            active_boosts: entry
                .active_boosts
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            effective_score_for_sort: entry.effective_score_for_sort,
            decision: entry.decision.as_str().to_string(),
            base_reward: entry.base_reward,
            boosted_reward: entry.boosted_reward,
        }
    }
}

impl TryFrom<SnapshotEntryDoc> for LeaderboardEntry {
    type Error = PodiumError;

    fn try_from(doc: SnapshotEntryDoc) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&doc.identity)
            .map_err(|e| PodiumError::Database(format!("corrupt snapshot identity '{}': {}", doc.identity, e)))?;
        let rank = u32::try_from(doc.rank)
            .map_err(|_| PodiumError::Database(format!("corrupt snapshot rank {}", doc.rank)))?;
        let active_boosts = doc
            .active_boosts
            .iter()
            .map(|s| s.parse::<BoostSignal>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PodiumError::Database(format!("corrupt snapshot boost: {}", e)))?;
        let decision = doc
            .decision
            .parse()
            .map_err(|e| PodiumError::Database(format!("corrupt snapshot decision: {}", e)))?;

        Ok(LeaderboardEntry {
            identity: Identity {
                id,
                handle: doc.handle,
                wallet_address: doc.wallet_address,
            },
            rank,
            raw_score: doc.raw_score,
            boost_multiplier: doc.boost_multiplier,
            active_boosts,
            effective_score_for_sort: doc.effective_score_for_sort,
            decision,
            base_reward: doc.base_reward,
            boosted_reward: doc.boosted_reward,
        })
    }
}

impl From<&Snapshot> for SnapshotDoc {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            program_id: snapshot.program_id.clone(),
            captured_at: bson::DateTime::from_chrono(snapshot.captured_at),
            total_count: snapshot.total_count as i64,
            entries: snapshot.entries.iter().map(SnapshotEntryDoc::from).collect(),
        }
    }
}

impl TryFrom<SnapshotDoc> for Snapshot {
    type Error = PodiumError;

    fn try_from(doc: SnapshotDoc) -> Result<Self, Self::Error> {
        let entries = doc
            .entries
            .into_iter()
            .map(LeaderboardEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Snapshot {
            program_id: doc.program_id,
            captured_at: doc.captured_at.to_chrono(),
            entries,
            total_count: doc.total_count.max(0) as u64,
        })
    }
}

impl IntoIndexes for SnapshotDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "program_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("program_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for SnapshotDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RewardDecision;
    use chrono::{TimeZone, Utc};

    fn entry() -> LeaderboardEntry {
        LeaderboardEntry {
            identity: Identity {
                id: Uuid::from_u128(9),
                handle: Some("grace".into()),
                wallet_address: None,
            },
            rank: 1,
            raw_score: 88.5,
            boost_multiplier: 1.2,
            active_boosts: vec![BoostSignal::Notifications, BoostSignal::SocialVerified],
            effective_score_for_sort: 88.5,
            decision: RewardDecision::OptedIn,
            base_reward: 50.0,
            boosted_reward: 60.0,
        }
    }

    #[test]
    fn test_snapshot_survives_document_form() {
        let snapshot = Snapshot {
            program_id: "round-1".into(),
            captured_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
            entries: vec![entry()],
            total_count: 340,
        };

        let doc = SnapshotDoc::from(&snapshot);
        assert_eq!(doc.entries[0].active_boosts, vec!["notifications", "social_verified"]);
        let back = Snapshot::try_from(doc).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_negative_rank_rejected() {
        let mut doc = SnapshotEntryDoc::from(&entry());
        doc.rank = -1;
        assert!(LeaderboardEntry::try_from(doc).is_err());
    }
}

//! Reward decision document schema
//!
//! One document per identity; writes upsert on the unique identity index.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::{DecisionRecord, PodiumError, RewardDecision};

/// Collection name for decisions
pub const DECISION_COLLECTION: &str = "reward_decisions";

/// Decision document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DecisionDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Participant UUID (hyphenated string form)
    pub identity: String,

    /// One of opted_in, opted_out, undecided
    pub decision: String,

    /// When the decision was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<bson::DateTime>,

    /// Wallet the payout goes to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_wallet_address: Option<String>,
}

impl TryFrom<DecisionDoc> for DecisionRecord {
    type Error = PodiumError;

    fn try_from(doc: DecisionDoc) -> Result<Self, Self::Error> {
        let identity = Uuid::parse_str(&doc.identity)
            .map_err(|e| PodiumError::Database(format!("corrupt identity '{}': {}", doc.identity, e)))?;
        let decision: RewardDecision = doc
            .decision
            .parse()
            .map_err(|e| PodiumError::Database(format!("corrupt decision for {}: {}", identity, e)))?;
        Ok(DecisionRecord {
            identity,
            decision,
            decided_at: doc.decided_at.map(|dt| dt.to_chrono()),
            primary_wallet_address: doc.primary_wallet_address,
        })
    }
}

impl IntoIndexes for DecisionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "identity": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("identity_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DecisionDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

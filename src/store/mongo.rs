//! MongoDB adapters for decisions and the payout snapshot

use async_trait::async_trait;
use bson::{doc, Bson};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CreateOutcome, PreferenceStore, SnapshotStore};
use crate::db::schemas::{DecisionDoc, SnapshotDoc, DECISION_COLLECTION, SNAPSHOT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{DecisionRecord, PodiumError, Result, RewardDecision, Snapshot};

/// Decisions persisted in `reward_decisions`, one document per identity
#[derive(Clone)]
pub struct MongoPreferenceStore {
    collection: MongoCollection<DecisionDoc>,
}

impl MongoPreferenceStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<DecisionDoc>(DECISION_COLLECTION).await?;
        info!(collection = DECISION_COLLECTION, "Decision store ready");
        Ok(Self { collection })
    }
}

#[async_trait]
impl PreferenceStore for MongoPreferenceStore {
    async fn get_decision(&self, identity: Uuid) -> Result<DecisionRecord> {
        match self
            .collection
            .find_one(doc! { "identity": identity.to_string() })
            .await?
        {
            Some(doc) => DecisionRecord::try_from(doc),
            None => Ok(DecisionRecord::undecided(identity)),
        }
    }

    async fn get_decisions(&self, identities: &[Uuid]) -> Result<HashMap<Uuid, DecisionRecord>> {
        if identities.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = identities.iter().map(Uuid::to_string).collect();
        let docs = self
            .collection
            .find_many(doc! { "identity": { "$in": ids } })
            .await?;

        let decisions = decisions_from_docs(docs)?;
        debug!(requested = identities.len(), found = decisions.len(), "Loaded decisions");
        Ok(decisions)
    }

    async fn put_decision(
        &self,
        identity: Uuid,
        decision: RewardDecision,
        wallet: Option<String>,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionRecord> {
        let stored_at = bson::DateTime::from_chrono(decided_at);
        let wallet_bson = wallet.clone().map(Bson::String).unwrap_or(Bson::Null);

        self.collection
            .upsert_one(
                doc! { "identity": identity.to_string() },
                doc! {
                    "$set": {
                        "decision": decision.as_str(),
                        "decided_at": stored_at,
                        "primary_wallet_address": wallet_bson,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$setOnInsert": {
                        "metadata.created_at": bson::DateTime::now(),
                    },
                },
            )
            .await?;

        // Mongo keeps millisecond precision; report what a later read returns
        Ok(DecisionRecord {
            identity,
            decision,
            decided_at: Some(stored_at.to_chrono()),
            primary_wallet_address: wallet,
        })
    }
}

/// Convert a batch of decision documents. Any unreadable document fails the
/// whole batch so it is never priced as undecided.
fn decisions_from_docs(docs: Vec<DecisionDoc>) -> Result<HashMap<Uuid, DecisionRecord>> {
    let mut decisions = HashMap::with_capacity(docs.len());
    for doc in docs {
        let record = DecisionRecord::try_from(doc).map_err(|e| {
            warn!(error = %e, "Unreadable decision document");
            e
        })?;
        decisions.insert(record.identity, record);
    }
    Ok(decisions)
}

/// The payout snapshot in `reward_snapshots`, unique per program
#[derive(Clone)]
pub struct MongoSnapshotStore {
    collection: MongoCollection<SnapshotDoc>,
    program_id: String,
}

impl MongoSnapshotStore {
    pub async fn new(client: &MongoClient, program_id: &str) -> Result<Self> {
        let collection = client.collection::<SnapshotDoc>(SNAPSHOT_COLLECTION).await?;
        info!(collection = SNAPSHOT_COLLECTION, program = program_id, "Snapshot store ready");
        Ok(Self {
            collection,
            program_id: program_id.to_string(),
        })
    }
}

#[async_trait]
impl SnapshotStore for MongoSnapshotStore {
    async fn try_create(&self, snapshot: &Snapshot) -> Result<CreateOutcome> {
        if snapshot.program_id != self.program_id {
            return Err(PodiumError::Internal(format!(
                "snapshot for program '{}' offered to store for '{}'",
                snapshot.program_id, self.program_id
            )));
        }

        match self.collection.insert_one(SnapshotDoc::from(snapshot)).await {
            Ok(id) => {
                debug!(id = %id, program = %self.program_id, "Snapshot document inserted");
                Ok(CreateOutcome::Created)
            }
            Err(PodiumError::Conflict(_)) => Ok(CreateOutcome::Conflict),
            Err(e) => Err(e),
        }
    }

    async fn read(&self) -> Result<Option<Snapshot>> {
        self.collection
            .find_one(doc! { "program_id": self.program_id.as_str() })
            .await?
            .map(Snapshot::try_from)
            .transpose()
    }
}

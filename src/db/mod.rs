//! Database layer for Podium
//!
//! MongoDB storage for reward decisions and the payout snapshot.

pub mod mongo;
pub mod schemas;

pub use mongo::{is_duplicate_key, MongoClient, MongoCollection};
pub use schemas::{DecisionDoc, Metadata, SnapshotDoc, SnapshotEntryDoc};

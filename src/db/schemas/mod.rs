//! Database schemas for Podium
//!
//! Defines MongoDB document structures for decisions and snapshots.

mod decision;
mod metadata;
mod snapshot;

pub use decision::{DecisionDoc, DECISION_COLLECTION};
pub use metadata::Metadata;
pub use snapshot::{SnapshotDoc, SnapshotEntryDoc, SNAPSHOT_COLLECTION};

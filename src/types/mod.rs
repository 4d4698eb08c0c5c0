//! Shared types for Podium

pub mod error;
pub mod leaderboard;

pub use error::{PodiumError, Result};
pub use leaderboard::{
    BoostInputs, DecisionRecord, Identity, LeaderboardEntry, LeaderboardPage, RankedScore,
    RewardDecision, ScoreRecord, Snapshot, SnapshotSummary, Standing,
};

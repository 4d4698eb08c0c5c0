//! Leaderboard domain types
//!
//! Shared by the ranking, overlay, snapshot and storage layers. JSON field
//! names are camelCase to match the upstream score API and the read surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::PodiumError;
use crate::boost::BoostSignal;

/// A program participant. The UUID is canonical; aliases are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

impl Identity {
    /// Identity with no aliases
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            handle: None,
            wallet_address: None,
        }
    }
}

/// Engagement inputs the boost engine turns into signals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostInputs {
    #[serde(default)]
    pub token_balance: f64,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub social_verified: bool,
}

/// Raw score as delivered by the score source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub identity: Identity,
    pub raw_score: f64,
    /// `None` means the score was never computed; such records are not ranked.
    pub computed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_calculating: bool,
    #[serde(default)]
    pub boost: BoostInputs,
}

/// A participant's reward decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardDecision {
    OptedIn,
    OptedOut,
    #[default]
    Undecided,
}

impl RewardDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OptedIn => "opted_in",
            Self::OptedOut => "opted_out",
            Self::Undecided => "undecided",
        }
    }

    pub fn is_opted_in(&self) -> bool {
        matches!(self, Self::OptedIn)
    }
}

impl fmt::Display for RewardDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardDecision {
    type Err = PodiumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opted_in" => Ok(Self::OptedIn),
            "opted_out" => Ok(Self::OptedOut),
            "undecided" => Ok(Self::Undecided),
            other => Err(PodiumError::Validation(format!(
                "unknown decision '{}' (expected opted_in, opted_out or undecided)",
                other
            ))),
        }
    }
}

/// Persisted decision state for one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub identity: Uuid,
    pub decision: RewardDecision,
    pub decided_at: Option<DateTime<Utc>>,
    pub primary_wallet_address: Option<String>,
}

impl DecisionRecord {
    /// The implicit record of an identity that never wrote a decision
    pub fn undecided(identity: Uuid) -> Self {
        Self {
            identity,
            decision: RewardDecision::Undecided,
            decided_at: None,
            primary_wallet_address: None,
        }
    }
}

/// Ranked, boosted score before any decision is applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedScore {
    pub identity: Identity,
    pub rank: u32,
    pub raw_score: f64,
    pub boost_multiplier: f64,
    #[serde(default)]
    pub active_boosts: Vec<BoostSignal>,
}

/// One row of the leaderboard with rewards applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub rank: u32,
    pub raw_score: f64,
    pub boost_multiplier: f64,
    #[serde(default)]
    pub active_boosts: Vec<BoostSignal>,
    pub effective_score_for_sort: f64,
    pub decision: RewardDecision,
    pub base_reward: f64,
    pub boosted_reward: f64,
}

/// The frozen top-N ranking used for payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub program_id: String,
    pub captured_at: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
    /// Ranked participants at capture time, including those beyond the cutoff
    pub total_count: u64,
}

impl Snapshot {
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            program_id: self.program_id.clone(),
            captured_at: self.captured_at,
            total_count: self.total_count,
            entry_count: self.entries.len() as u64,
            opted_in_count: self
                .entries
                .iter()
                .filter(|e| e.decision.is_opted_in())
                .count() as u64,
            total_base_reward: self.entries.iter().map(|e| e.base_reward).sum(),
            total_boosted_reward: self.entries.iter().map(|e| e.boosted_reward).sum(),
        }
    }

    pub fn entry_for(&self, id: Uuid) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.identity.id == id)
    }
}

/// Aggregate counts over a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub program_id: String,
    pub captured_at: DateTime<Utc>,
    pub total_count: u64,
    pub entry_count: u64,
    pub opted_in_count: u64,
    pub total_base_reward: f64,
    pub total_boosted_reward: f64,
}

/// A page of the live leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub offset: usize,
    pub limit: usize,
    pub total_count: usize,
}

/// Everything the read surface knows about one identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub identity: Uuid,
    /// Live ranking entry, absent if the identity has no computed score
    pub live: Option<LeaderboardEntry>,
    /// Frozen entry, present once a snapshot exists and includes the identity
    pub snapshot: Option<LeaderboardEntry>,
    pub snapshot_captured: bool,
}

//! Cache tags and the mutation → tag table
//!
//! Every write path names its mutation; the tags it invalidates come from
//! [`Mutation::tags`] and nowhere else.

use std::fmt;
use uuid::Uuid;

/// Key scoping one cached computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Top-N entries with decisions and rewards applied
    RankingTop,
    /// Full ranked list with boosts, no decisions
    RankingBasic,
    /// The persisted snapshot
    SnapshotProfiles,
    /// One identity's decision record
    Decision(Uuid),
}

impl CacheTag {
    /// Program-wide tags
    pub const GLOBAL: [CacheTag; 3] = [
        CacheTag::RankingTop,
        CacheTag::RankingBasic,
        CacheTag::SnapshotProfiles,
    ];

    /// Storage key for this tag
    pub fn key(&self) -> String {
        match self {
            Self::RankingTop => "ranking-top200".to_string(),
            Self::RankingBasic => "ranking-basic".to_string(),
            Self::SnapshotProfiles => "ranking-snapshot-profiles".to_string(),
            Self::Decision(id) => format!("decision:{}", id),
        }
    }

    pub fn is_global(&self) -> bool {
        !matches!(self, Self::Decision(_))
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A write that can change ranking-visible state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A participant wrote a reward decision
    DecisionWritten(Uuid),
    /// The payout snapshot was persisted
    SnapshotCreated,
    /// Upstream scores were recomputed
    ScoresRefreshed,
}

impl Mutation {
    /// Tags that must be invalidated before the write reports success
    pub fn tags(&self) -> Vec<CacheTag> {
        match self {
            Self::DecisionWritten(id) => vec![
                CacheTag::Decision(*id),
                CacheTag::RankingTop,
                CacheTag::RankingBasic,
            ],
            Self::SnapshotCreated => vec![
                CacheTag::SnapshotProfiles,
                CacheTag::RankingTop,
                CacheTag::RankingBasic,
            ],
            Self::ScoresRefreshed => vec![CacheTag::RankingBasic, CacheTag::RankingTop],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DecisionWritten(_) => "decision_written",
            Self::SnapshotCreated => "snapshot_created",
            Self::ScoresRefreshed => "scores_refreshed",
        }
    }
}

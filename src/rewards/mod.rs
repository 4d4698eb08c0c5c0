//! Decision overlay
//!
//! Merges reward decisions into ranked scores and computes base and boosted
//! rewards. Only opted-in entries within the first `reward_slots` ranks are
//! paid. Allocation happens in integer minor units; the sum of base rewards
//! never exceeds the configured pool.

pub mod curve;
pub mod redistribution;

pub use curve::{curve_from_config, AllocationCurve, EqualCurve, GeometricCurve, LinearCurve};
pub use redistribution::{
    policy_from_config, ForfeitPolicy, ProRataPolicy, RedistributionPolicy, Slot,
};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ProgramConfig;
use crate::types::{DecisionRecord, LeaderboardEntry, RankedScore, RewardDecision};

/// Computes rewards for ranked entries under the program rules
#[derive(Clone)]
pub struct RewardCalculator {
    config: ProgramConfig,
    curve: Arc<dyn AllocationCurve>,
    policy: Arc<dyn RedistributionPolicy>,
}

impl RewardCalculator {
    /// Calculator using the curve and policy named in the configuration
    pub fn from_config(config: ProgramConfig) -> Self {
        let curve = curve_from_config(&config);
        let policy = policy_from_config(&config);
        Self {
            config,
            curve,
            policy,
        }
    }

    /// Calculator with injected strategies
    pub fn with_strategies(
        config: ProgramConfig,
        curve: Arc<dyn AllocationCurve>,
        policy: Arc<dyn RedistributionPolicy>,
    ) -> Self {
        Self {
            config,
            curve,
            policy,
        }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Minor-unit base reward per rewarded rank, in rank order.
    ///
    /// `ranked` must be sorted by rank. Entries beyond the cutoff are ignored.
    fn allocate(&self, ranked: &[RankedScore], decisions: &HashMap<Uuid, DecisionRecord>) -> Vec<u64> {
        let slots_total = self.config.reward_slots;
        let slots: Vec<Slot> = ranked
            .iter()
            .take_while(|r| r.rank <= slots_total)
            .map(|r| Slot {
                rank: r.rank,
                weight: self.curve.weight(r.rank, slots_total),
                eligible: decision_of(decisions, r.identity.id).is_opted_in(),
            })
            .collect();

        let pool = self.config.pool_minor_units();
        let mut shares = self.policy.allocate(pool, &slots);
        shares.resize(slots.len(), 0);
        for (slot, share) in slots.iter().zip(shares.iter_mut()) {
            if !slot.eligible {
                *share = 0;
            }
        }

        // A policy is only trusted up to the pool; trim from the bottom.
        let mut total: u64 = shares.iter().sum();
        if total > pool {
            warn!(
                policy = self.policy.name(),
                allocated = total,
                pool = pool,
                "Redistribution over-allocated; trimming lowest ranks"
            );
            for share in shares.iter_mut().rev() {
                if total <= pool {
                    break;
                }
                let cut = (*share).min(total - pool);
                *share -= cut;
                total -= cut;
            }
        }

        debug!(
            curve = self.curve.name(),
            policy = self.policy.name(),
            slots = slots.len(),
            allocated = shares.iter().sum::<u64>(),
            pool = pool,
            "Allocated reward pool"
        );
        shares
    }

    /// Overlay decisions onto a ranked list, producing leaderboard entries.
    pub fn overlay(
        &self,
        ranked: &[RankedScore],
        decisions: &HashMap<Uuid, DecisionRecord>,
    ) -> Vec<LeaderboardEntry> {
        let shares = self.allocate(ranked, decisions);
        let scale = self.config.minor_per_unit();

        ranked
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let decision = decision_of(decisions, r.identity.id);
                let base_minor = shares.get(i).copied().unwrap_or(0);
                let base_reward = base_minor as f64 / scale;
                LeaderboardEntry {
                    identity: r.identity.clone(),
                    rank: r.rank,
                    raw_score: r.raw_score,
                    boost_multiplier: r.boost_multiplier,
                    active_boosts: r.active_boosts.clone(),
                    effective_score_for_sort: r.raw_score,
                    decision,
                    base_reward,
                    boosted_reward: self.config.round_currency(base_reward * r.boost_multiplier),
                }
            })
            .collect()
    }
}

fn decision_of(decisions: &HashMap<Uuid, DecisionRecord>, id: Uuid) -> RewardDecision {
    decisions
        .get(&id)
        .map(|d| d.decision)
        .unwrap_or(RewardDecision::Undecided)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CurveKind, RedistributionKind};
    use crate::types::Identity;

    fn ranked(n: u32) -> Vec<RankedScore> {
        (1..=n)
            .map(|rank| RankedScore {
                identity: Identity::new(Uuid::from_u128(rank as u128)),
                rank,
                raw_score: (1000 - rank) as f64,
                boost_multiplier: 1.0,
                active_boosts: Vec::new(),
            })
            .collect()
    }

    fn decide(map: &mut HashMap<Uuid, DecisionRecord>, rank: u128, decision: RewardDecision) {
        let id = Uuid::from_u128(rank);
        map.insert(
            id,
            DecisionRecord {
                identity: id,
                decision,
                decided_at: Some(chrono::Utc::now()),
                primary_wallet_address: None,
            },
        );
    }

    fn config(pool: f64, slots: u32, redistribution: RedistributionKind) -> ProgramConfig {
        ProgramConfig {
            pool_total: pool,
            reward_slots: slots,
            redistribution,
            ..ProgramConfig::default()
        }
    }

    #[test]
    fn test_example_scenario_pro_rata() {
        let calc = RewardCalculator::from_config(config(100.0, 3, RedistributionKind::ProRata));
        let mut decisions = HashMap::new();
        decide(&mut decisions, 1, RewardDecision::OptedOut);
        decide(&mut decisions, 2, RewardDecision::OptedIn);
        // rank 3 never decided

        let entries = calc.overlay(&ranked(3), &decisions);
        let base: Vec<f64> = entries.iter().map(|e| e.base_reward).collect();
        assert_eq!(base, vec![0.0, 100.0, 0.0]);
        assert_eq!(entries[2].decision, RewardDecision::Undecided);
    }

    #[test]
    fn test_example_scenario_forfeit() {
        let calc = RewardCalculator::from_config(config(100.0, 3, RedistributionKind::Forfeit));
        let mut decisions = HashMap::new();
        decide(&mut decisions, 1, RewardDecision::OptedOut);
        decide(&mut decisions, 2, RewardDecision::OptedIn);

        let entries = calc.overlay(&ranked(3), &decisions);
        assert_eq!(entries[1].base_reward, 33.33);
        let total: f64 = entries.iter().map(|e| e.base_reward).sum();
        assert!(total <= 100.0);
    }

    #[test]
    fn test_beyond_cutoff_gets_nothing() {
        let calc = RewardCalculator::from_config(config(1000.0, 2, RedistributionKind::ProRata));
        let mut decisions = HashMap::new();
        for rank in 1..=4 {
            decide(&mut decisions, rank, RewardDecision::OptedIn);
        }

        let entries = calc.overlay(&ranked(4), &decisions);
        assert_eq!(entries[0].base_reward, 500.0);
        assert_eq!(entries[1].base_reward, 500.0);
        assert_eq!(entries[2].base_reward, 0.0);
        assert_eq!(entries[3].base_reward, 0.0);
        assert_eq!(entries[3].decision, RewardDecision::OptedIn);
    }

    #[test]
    fn test_boosted_reward_is_rounded_product() {
        let calc = RewardCalculator::from_config(config(100.0, 3, RedistributionKind::ProRata));
        let mut rows = ranked(3);
        rows[0].boost_multiplier = 1.1;
        let mut decisions = HashMap::new();
        for rank in 1..=3 {
            decide(&mut decisions, rank, RewardDecision::OptedIn);
        }

        let entries = calc.overlay(&rows, &decisions);
        assert_eq!(entries[0].base_reward, 33.33);
        assert_eq!(entries[0].boosted_reward, 36.66);
        assert_eq!(entries[1].boosted_reward, 33.33);
    }

    #[test]
    fn test_conservation_across_curves_and_policies() {
        for curve in [CurveKind::Equal, CurveKind::Linear, CurveKind::Geometric] {
            for redistribution in [RedistributionKind::Forfeit, RedistributionKind::ProRata] {
                let calc = RewardCalculator::from_config(ProgramConfig {
                    pool_total: 12_345.67,
                    reward_slots: 200,
                    curve,
                    redistribution,
                    ..ProgramConfig::default()
                });
                let mut decisions = HashMap::new();
                for rank in 1..=250u128 {
                    let decision = match rank % 3 {
                        0 => RewardDecision::OptedIn,
                        1 => RewardDecision::OptedOut,
                        _ => RewardDecision::Undecided,
                    };
                    decide(&mut decisions, rank, if rank % 5 == 0 { RewardDecision::OptedIn } else { decision });
                }

                let entries = calc.overlay(&ranked(250), &decisions);
                let minor: u64 = entries.iter().map(|e| (e.base_reward * 100.0).round() as u64).sum();
                assert!(minor <= 1_234_567, "{:?}/{:?} allocated {}", curve, redistribution, minor);
                assert!(entries
                    .iter()
                    .filter(|e| !e.decision.is_opted_in() || e.rank > 200)
                    .all(|e| e.base_reward == 0.0));
            }
        }
    }

    #[test]
    fn test_monotone_rewards_for_opted_in() {
        let calc = RewardCalculator::from_config(ProgramConfig {
            pool_total: 5000.0,
            reward_slots: 50,
            curve: CurveKind::Linear,
            ..ProgramConfig::default()
        });
        let mut decisions = HashMap::new();
        for rank in 1..=50 {
            decide(&mut decisions, rank, RewardDecision::OptedIn);
        }
        let entries = calc.overlay(&ranked(50), &decisions);
        for pair in entries.windows(2) {
            assert!(pair[0].base_reward >= pair[1].base_reward);
        }
    }

    struct GreedyPolicy;

    impl RedistributionPolicy for GreedyPolicy {
        fn allocate(&self, pool_minor: u64, slots: &[Slot]) -> Vec<u64> {
            vec![pool_minor; slots.len()]
        }

        fn name(&self) -> &'static str {
            "greedy"
        }
    }

    #[test]
    fn test_overallocating_policy_is_trimmed() {
        let calc = RewardCalculator::with_strategies(
            config(10.0, 3, RedistributionKind::ProRata),
            Arc::new(EqualCurve),
            Arc::new(GreedyPolicy),
        );
        let mut decisions = HashMap::new();
        for rank in 1..=3 {
            decide(&mut decisions, rank, RewardDecision::OptedIn);
        }
        let entries = calc.overlay(&ranked(3), &decisions);
        let base: Vec<f64> = entries.iter().map(|e| e.base_reward).collect();
        assert_eq!(base, vec![10.0, 0.0, 0.0]);
    }
}

//! Redistribution of forfeited shares
//!
//! Policies split the pool (in currency minor units) over the rewarded slots.
//! Every policy floors each share, so the total never exceeds the pool.

use crate::config::{ProgramConfig, RedistributionKind};
use std::sync::Arc;

/// One rewarded rank as seen by a policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub rank: u32,
    pub weight: f64,
    /// Opted in; only eligible slots may receive a share
    pub eligible: bool,
}

/// Strategy for splitting the pool when some slots forfeit
pub trait RedistributionPolicy: Send + Sync {
    /// Minor-unit share per slot, same order as `slots`
    fn allocate(&self, pool_minor: u64, slots: &[Slot]) -> Vec<u64>;

    fn name(&self) -> &'static str;
}

/// Split `pool_minor` over eligible slots by weight, dividing by `total_weight`
fn floor_shares(pool_minor: u64, slots: &[Slot], total_weight: f64) -> Vec<u64> {
    if total_weight <= 0.0 || !total_weight.is_finite() {
        return vec![0; slots.len()];
    }
    slots
        .iter()
        .map(|slot| {
            if slot.eligible && slot.weight > 0.0 {
                (pool_minor as f64 * slot.weight / total_weight).floor() as u64
            } else {
                0
            }
        })
        .collect()
}

/// Forfeited shares stay unallocated
#[derive(Debug, Clone, Copy, Default)]
pub struct ForfeitPolicy;

impl RedistributionPolicy for ForfeitPolicy {
    fn allocate(&self, pool_minor: u64, slots: &[Slot]) -> Vec<u64> {
        let total: f64 = slots.iter().map(|s| s.weight).sum();
        floor_shares(pool_minor, slots, total)
    }

    fn name(&self) -> &'static str {
        "forfeit"
    }
}

/// Forfeited shares flow to eligible slots in proportion to their weight
#[derive(Debug, Clone, Copy, Default)]
pub struct ProRataPolicy;

impl RedistributionPolicy for ProRataPolicy {
    fn allocate(&self, pool_minor: u64, slots: &[Slot]) -> Vec<u64> {
        let total: f64 = slots.iter().filter(|s| s.eligible).map(|s| s.weight).sum();
        floor_shares(pool_minor, slots, total)
    }

    fn name(&self) -> &'static str {
        "pro-rata"
    }
}

/// Build the configured policy
pub fn policy_from_config(config: &ProgramConfig) -> Arc<dyn RedistributionPolicy> {
    match config.redistribution {
        RedistributionKind::Forfeit => Arc::new(ForfeitPolicy),
        RedistributionKind::ProRata => Arc::new(ProRataPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(eligible: &[bool]) -> Vec<Slot> {
        eligible
            .iter()
            .enumerate()
            .map(|(i, e)| Slot {
                rank: i as u32 + 1,
                weight: 1.0,
                eligible: *e,
            })
            .collect()
    }

    #[test]
    fn test_forfeit_keeps_share_in_pool() {
        let shares = ForfeitPolicy.allocate(10_000, &slots(&[false, true, false]));
        assert_eq!(shares, vec![0, 3333, 0]);
    }

    #[test]
    fn test_pro_rata_gives_whole_pool_to_single_opt_in() {
        let shares = ProRataPolicy.allocate(10_000, &slots(&[false, true, false]));
        assert_eq!(shares, vec![0, 10_000, 0]);
    }

    #[test]
    fn test_nobody_eligible() {
        assert_eq!(ProRataPolicy.allocate(10_000, &slots(&[false, false])), vec![0, 0]);
        assert_eq!(ForfeitPolicy.allocate(10_000, &slots(&[false, false])), vec![0, 0]);
    }

    #[test]
    fn test_shares_never_exceed_pool() {
        let mixed: Vec<Slot> = (1..=200)
            .map(|rank| Slot {
                rank,
                weight: 0.97f64.powi(rank as i32 - 1),
                eligible: rank % 3 != 0,
            })
            .collect();
        for pool in [1u64, 7, 999, 10_000_000, 123_456_789] {
            let pro_rata: u64 = ProRataPolicy.allocate(pool, &mixed).iter().sum();
            let forfeit: u64 = ForfeitPolicy.allocate(pool, &mixed).iter().sum();
            assert!(pro_rata <= pool);
            assert!(forfeit <= pool);
            assert!(forfeit <= pro_rata);
        }
    }
}

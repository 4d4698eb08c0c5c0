//! Ranking computation
//!
//! Pure function from score records to a total order. Ranks are 1-based and
//! gapless over the eligible set; equal scores are ordered by identity so the
//! same input always yields the same assignment.

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::boost::BoostEngine;
use crate::types::{RankedScore, ScoreRecord};

/// Whether a record may be ranked
fn is_eligible(record: &ScoreRecord) -> bool {
    record.computed_at.is_some() && record.raw_score.is_finite() && record.raw_score >= 0.0
}

/// Score descending, then identity ascending
fn rank_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.raw_score
        .total_cmp(&a.raw_score)
        .then_with(|| a.identity.id.cmp(&b.identity.id))
}

/// Drop ineligible records and collapse duplicate identities.
///
/// Pagination can return the same identity twice; the record with the latest
/// `computed_at` wins, ties keep the higher score.
pub fn eligible_records(records: Vec<ScoreRecord>) -> Vec<ScoreRecord> {
    let mut by_id: HashMap<Uuid, ScoreRecord> = HashMap::with_capacity(records.len());
    let mut never_computed = 0usize;

    for record in records {
        if record.computed_at.is_none() {
            never_computed += 1;
            continue;
        }
        if !is_eligible(&record) {
            warn!(
                identity = %record.identity.id,
                raw_score = record.raw_score,
                "Skipping score record with invalid raw score"
            );
            continue;
        }
        let replace = match by_id.get(&record.identity.id) {
            None => true,
            Some(existing) => {
                record.computed_at > existing.computed_at
                    || (record.computed_at == existing.computed_at
                        && record.raw_score > existing.raw_score)
            }
        };
        if replace {
            by_id.insert(record.identity.id, record);
        }
    }

    if never_computed > 0 {
        debug!(count = never_computed, "Excluded records without a computed score");
    }

    by_id.into_values().collect()
}

/// Sort eligible records and assign ranks `1..=M`
pub fn compute_ranking(records: Vec<ScoreRecord>) -> Vec<(u32, ScoreRecord)> {
    let mut eligible = eligible_records(records);
    eligible.sort_by(rank_order);
    eligible
        .into_iter()
        .enumerate()
        .map(|(i, record)| ((i + 1) as u32, record))
        .collect()
}

/// Rank and boost in one pass
pub fn rank_and_boost(records: Vec<ScoreRecord>, engine: &BoostEngine) -> Vec<RankedScore> {
    compute_ranking(records)
        .into_iter()
        .map(|(rank, record)| {
            let boost = engine.boost(&record);
            RankedScore {
                identity: record.identity,
                rank,
                raw_score: record.raw_score,
                boost_multiplier: boost.multiplier,
                active_boosts: boost.active,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoostInputs, Identity};
    use chrono::{Duration, Utc};

    fn record(id: Uuid, score: f64) -> ScoreRecord {
        ScoreRecord {
            identity: Identity::new(id),
            raw_score: score,
            computed_at: Some(Utc::now()),
            is_calculating: false,
            boost: BoostInputs::default(),
        }
    }

    fn ids(n: u128) -> Vec<Uuid> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    #[test]
    fn test_tie_broken_by_identity() {
        let id = ids(3);
        // Input order deliberately scrambled
        let ranked = compute_ranking(vec![
            record(id[2], 30.0),
            record(id[1], 50.0),
            record(id[0], 50.0),
        ]);

        let order: Vec<(u32, Uuid)> = ranked.iter().map(|(r, rec)| (*r, rec.identity.id)).collect();
        assert_eq!(order, vec![(1, id[0]), (2, id[1]), (3, id[2])]);
    }

    #[test]
    fn test_deterministic_over_input_order() {
        let id = ids(6);
        let scores = [10.0, 10.0, 7.5, 99.0, 10.0, 0.0];
        let forward: Vec<ScoreRecord> = id.iter().zip(scores).map(|(i, s)| record(*i, s)).collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a: Vec<(u32, Uuid)> = compute_ranking(forward)
            .into_iter()
            .map(|(r, rec)| (r, rec.identity.id))
            .collect();
        let b: Vec<(u32, Uuid)> = compute_ranking(backward)
            .into_iter()
            .map(|(r, rec)| (r, rec.identity.id))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ranks_dense_over_filtered_set() {
        let id = ids(5);
        let mut never = record(id[1], 80.0);
        never.computed_at = None;
        let negative = record(id[3], -1.0);
        let nan = record(id[4], f64::NAN);

        let ranked = compute_ranking(vec![record(id[0], 5.0), never, record(id[2], 9.0), negative, nan]);

        let ranks: Vec<u32> = ranked.iter().map(|(r, _)| *r).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(ranked[0].1.identity.id, id[2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_ranking(Vec::new()).is_empty());
    }

    #[test]
    fn test_duplicate_identity_keeps_latest() {
        let id = Uuid::from_u128(7);
        let mut old = record(id, 90.0);
        old.computed_at = Some(Utc::now() - Duration::hours(2));
        let new = record(id, 40.0);

        let ranked = compute_ranking(vec![new, old]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].1.raw_score, 40.0);
    }

    #[test]
    fn test_rank_and_boost_carries_multiplier() {
        let id = ids(2);
        let mut boosted = record(id[1], 1.0);
        boosted.boost.notifications_enabled = true;

        let ranked = rank_and_boost(vec![record(id[0], 2.0), boosted], &BoostEngine::default());
        assert_eq!(ranked[0].boost_multiplier, 1.0);
        assert!((ranked[1].boost_multiplier - 1.1).abs() < 1e-12);
        assert_eq!(ranked[1].rank, 2);
    }
}

//! Allocation curves
//!
//! A curve assigns a relative weight to each rewarded rank. Weights must be
//! positive and non-increasing in rank.

use crate::config::{CurveKind, ProgramConfig};
use std::sync::Arc;

/// Relative weight of a rank within the rewarded set
pub trait AllocationCurve: Send + Sync {
    /// Weight for `rank` (1-based) out of `slots` rewarded ranks
    fn weight(&self, rank: u32, slots: u32) -> f64;

    fn name(&self) -> &'static str;
}

/// Every rank weighs the same
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualCurve;

impl AllocationCurve for EqualCurve {
    fn weight(&self, _rank: u32, _slots: u32) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        "equal"
    }
}

/// Weight `slots - rank + 1`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCurve;

impl AllocationCurve for LinearCurve {
    fn weight(&self, rank: u32, slots: u32) -> f64 {
        (slots.saturating_sub(rank) + 1) as f64
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Weight `ratio^(rank - 1)`
#[derive(Debug, Clone, Copy)]
pub struct GeometricCurve {
    pub ratio: f64,
}

impl AllocationCurve for GeometricCurve {
    fn weight(&self, rank: u32, _slots: u32) -> f64 {
        self.ratio.powi(rank.saturating_sub(1) as i32)
    }

    fn name(&self) -> &'static str {
        "geometric"
    }
}

/// Build the configured curve
pub fn curve_from_config(config: &ProgramConfig) -> Arc<dyn AllocationCurve> {
    match config.curve {
        CurveKind::Equal => Arc::new(EqualCurve),
        CurveKind::Linear => Arc::new(LinearCurve),
        CurveKind::Geometric => Arc::new(GeometricCurve {
            ratio: config.curve_ratio,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_non_increasing(curve: &dyn AllocationCurve, slots: u32) {
        let mut prev = f64::INFINITY;
        for rank in 1..=slots {
            let w = curve.weight(rank, slots);
            assert!(w > 0.0, "{} weight at rank {} must be positive", curve.name(), rank);
            assert!(w <= prev, "{} increases at rank {}", curve.name(), rank);
            prev = w;
        }
    }

    #[test]
    fn test_curves_are_monotone() {
        assert_non_increasing(&EqualCurve, 200);
        assert_non_increasing(&LinearCurve, 200);
        assert_non_increasing(&GeometricCurve { ratio: 0.98 }, 200);
        assert_non_increasing(&GeometricCurve { ratio: 1.0 }, 50);
    }

    #[test]
    fn test_linear_endpoints() {
        assert_eq!(LinearCurve.weight(1, 200), 200.0);
        assert_eq!(LinearCurve.weight(200, 200), 1.0);
    }
}

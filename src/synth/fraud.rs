//! Exact-count fraud selection and per-row fraud patterns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::stream::{DeterministicStream, Lane};

/// Mutation applied to a row selected as fraudulent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudPattern {
    /// Amount scaled far above the account's normal spend.
    AmountSpike,
    /// Everyday merchant replaced by a high-risk category.
    MerchantSwap,
    /// Several rows on one account squeezed into a short window.
    VelocityBurst,
}

impl FraudPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudPattern::AmountSpike => "amount_spike",
            FraudPattern::MerchantSwap => "merchant_swap",
            FraudPattern::VelocityBurst => "velocity_burst",
        }
    }
}

impl fmt::Display for FraudPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative frequency of each pattern among fraud rows.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatternWeights {
    pub amount_spike: f64,
    pub merchant_swap: f64,
    pub velocity_burst: f64,
}

impl Default for PatternWeights {
    fn default() -> Self {
        Self {
            amount_spike: 0.4,
            merchant_swap: 0.3,
            velocity_burst: 0.3,
        }
    }
}

impl PatternWeights {
    pub fn total(&self) -> f64 {
        self.amount_spike + self.merchant_swap + self.velocity_burst
    }

    /// Pick a pattern from a uniform draw in (0, 1].
    pub fn pick(&self, u: f64) -> FraudPattern {
        let x = u * self.total();
        if x <= self.amount_spike {
            FraudPattern::AmountSpike
        } else if x <= self.amount_spike + self.merchant_swap {
            FraudPattern::MerchantSwap
        } else {
            FraudPattern::VelocityBurst
        }
    }
}

/// Resolved fraud mutation constants.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudRules {
    pub amount_multiplier: f64,
    pub velocity_window: Duration,
    pub velocity_burst_size: u64,
    pub pattern_weights: PatternWeights,
}

impl Default for FraudRules {
    fn default() -> Self {
        Self {
            amount_multiplier: 8.0,
            velocity_window: Duration::from_secs(600),
            velocity_burst_size: 4,
            pattern_weights: PatternWeights::default(),
        }
    }
}

/// `round(count * fraud_rate)`, never more than `count`.
pub fn target_fraud_count(count: u64, fraud_rate: f64) -> u64 {
    ((count as f64 * fraud_rate).round() as u64).min(count)
}

/// `select_fraud_indices(seed, count, fraud_rate)`: exactly `target_fraud_count`
/// distinct indices in `[0, count)`, ascending.
///
/// Runs the first `target` steps of a Fisher-Yates shuffle over `[0, count)`.
/// Only displaced slots are tracked, so memory is proportional to the target
/// rather than to `count`.
pub fn select_fraud_indices(seed: u64, count: u64, fraud_rate: f64) -> Vec<u64> {
    let target = target_fraud_count(count, fraud_rate);
    let stream = DeterministicStream::new(seed);
    let mut displaced: HashMap<u64, u64> = HashMap::with_capacity(target as usize);
    let mut selected = Vec::with_capacity(target as usize);

    for i in 0..target {
        let j = i + stream.below(i, Lane::FraudShuffle, count - i);
        let at_i = displaced.get(&i).copied().unwrap_or(i);
        let at_j = displaced.get(&j).copied().unwrap_or(j);
        displaced.insert(j, at_i);
        selected.push(at_j);
    }

    selected.sort_unstable();
    selected
}

/// The fraud rows of one generation job, shared read-only by all workers.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudPlan {
    indices: Vec<u64>,
}

impl FraudPlan {
    pub fn new(seed: u64, count: u64, fraud_rate: f64) -> Self {
        Self {
            indices: select_fraud_indices(seed, count, fraud_rate),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    /// Position of `index` among the fraud rows, if it is one.
    pub fn rank(&self, index: u64) -> Option<u64> {
        self.indices.binary_search(&index).ok().map(|r| r as u64)
    }

    pub fn contains(&self, index: u64) -> bool {
        self.rank(index).is_some()
    }

    /// Number of fraud rows in `[start, end)`.
    pub fn count_in(&self, start: u64, end: u64) -> u64 {
        let lo = self.indices.partition_point(|&i| i < start);
        let hi = self.indices.partition_point(|&i| i < end);
        (hi - lo) as u64
    }
}

/// Pattern for a fraud row, fixed by `(seed, index)`.
pub fn pattern_for(
    stream: &DeterministicStream,
    index: u64,
    weights: &PatternWeights,
) -> FraudPattern {
    weights.pick(stream.uniform(index, Lane::FraudPattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exact_count() {
        assert_eq!(select_fraud_indices(1, 1000, 0.05).len(), 50);
        assert_eq!(select_fraud_indices(2, 1000, 0.0).len(), 0);
        assert_eq!(select_fraud_indices(3, 1000, 1.0).len(), 1000);
        assert_eq!(select_fraud_indices(4, 7, 0.5).len(), 4); // round(3.5) = 4
    }

    #[test]
    fn test_indices_distinct_and_in_range() {
        let picked = select_fraud_indices(9, 10_000, 0.3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), picked.len());
        assert!(picked.iter().all(|&i| i < 10_000));
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_full_rate_selects_everything() {
        let picked = select_fraud_indices(3, 500, 1.0);
        assert_eq!(picked, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_reproducible_per_seed() {
        assert_eq!(
            select_fraud_indices(42, 5000, 0.02),
            select_fraud_indices(42, 5000, 0.02)
        );
        assert_ne!(
            select_fraud_indices(42, 5000, 0.02),
            select_fraud_indices(43, 5000, 0.02)
        );
    }

    #[test]
    fn test_selection_spread() {
        // Not clustered at the front of the range
        let picked = select_fraud_indices(8, 100_000, 0.01);
        let upper_half = picked.iter().filter(|&&i| i >= 50_000).count();
        assert!(upper_half > 400 && upper_half < 600, "upper half {}", upper_half);
    }

    #[test]
    fn test_plan_rank_and_count() {
        let plan = FraudPlan::new(5, 1000, 0.1);
        assert_eq!(plan.len(), 100);
        let first = plan.indices()[0];
        assert_eq!(plan.rank(first), Some(0));
        assert!(plan.contains(first));
        assert_eq!(plan.count_in(0, 1000), 100);
        assert_eq!(plan.count_in(0, 500) + plan.count_in(500, 1000), 100);
    }

    #[test]
    fn test_pattern_weights_pick() {
        let w = PatternWeights::default();
        assert_eq!(w.pick(0.1), FraudPattern::AmountSpike);
        assert_eq!(w.pick(0.4), FraudPattern::AmountSpike);
        assert_eq!(w.pick(0.5), FraudPattern::MerchantSwap);
        assert_eq!(w.pick(1.0), FraudPattern::VelocityBurst);

        let only_swap = PatternWeights {
            amount_spike: 0.0,
            merchant_swap: 1.0,
            velocity_burst: 0.0,
        };
        assert_eq!(only_swap.pick(0.999), FraudPattern::MerchantSwap);
    }

    #[test]
    fn test_target_rounding() {
        assert_eq!(target_fraud_count(1000, 0.05), 50);
        assert_eq!(target_fraud_count(3, 0.5), 2);
        assert_eq!(target_fraud_count(10, 1.0), 10);
    }
}

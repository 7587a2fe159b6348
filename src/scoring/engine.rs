use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::{ScoringWeights, TierThresholds};
use super::factors::{RiskFactors, FACTOR_NAMES};
use crate::error::{ensure_unit_interval, EngineResult};

/// Discrete risk tier derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One factor's share of the composite score, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: String,
    pub value: f64,
    pub weight: f64,
    /// `value * weight`
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub composite_score: f64,
    pub risk_tier: RiskTier,
    pub rationale: Vec<FactorContribution>,
}

/// A scoring request as received from the surrounding service.
///
/// `weights` and `thresholds` override the configured values for this request only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub model_id: String,
    pub tenant_id: String,
    #[serde(flatten)]
    pub factors: RiskFactors,
    pub assessor_id: String,
    #[serde(default)]
    pub weights: Option<ScoringWeights>,
    #[serde(default)]
    pub thresholds: Option<TierThresholds>,
}

fn contributions(factors: &RiskFactors, weights: &ScoringWeights) -> Vec<FactorContribution> {
    FACTOR_NAMES
        .iter()
        .zip(factors.as_array())
        .zip(weights.as_array())
        .map(|((name, value), weight)| FactorContribution {
            factor: name.to_string(),
            value,
            weight,
            contribution: value * weight,
        })
        .collect()
}

fn weighted_sum(rationale: &[FactorContribution]) -> f64 {
    rationale.iter().map(|c| c.contribution).sum()
}

/// Composite score: the weighted sum of the four factors.
///
/// The sum is divided by the realised weight sum, which is 1.0 up to rounding;
/// since every contribution is at most its weight, the quotient stays in [0, 1].
pub fn compute_score(factors: &RiskFactors, weights: &ScoringWeights) -> EngineResult<f64> {
    factors.validate()?;
    weights.validate()?;
    Ok(weighted_sum(&contributions(factors, weights)) / weights.sum())
}

/// Map a score to its tier. Thresholds are inclusive lower bounds, so a score
/// equal to a cut point lands in the higher tier.
pub fn classify_tier(score: f64, thresholds: &TierThresholds) -> EngineResult<RiskTier> {
    thresholds.validate()?;
    ensure_unit_interval("score", score)?;

    let tier = if score >= thresholds.critical {
        RiskTier::Critical
    } else if score >= thresholds.high {
        RiskTier::High
    } else if score >= thresholds.medium {
        RiskTier::Medium
    } else {
        RiskTier::Low
    };
    Ok(tier)
}

/// Score and classify a factor vector, returning the per-factor rationale.
pub fn score_factors(
    factors: &RiskFactors,
    weights: &ScoringWeights,
    thresholds: &TierThresholds,
) -> EngineResult<ScoreResult> {
    factors.validate()?;
    weights.validate()?;
    thresholds.validate()?;

    let rationale = contributions(factors, weights);
    let composite_score = weighted_sum(&rationale) / weights.sum();
    let risk_tier = classify_tier(composite_score, thresholds)?;

    Ok(ScoreResult {
        composite_score,
        risk_tier,
        rationale,
    })
}

/// Score a request, letting per-request weights/thresholds override the configured ones.
pub fn score_request(
    request: &ScoringRequest,
    weights: &ScoringWeights,
    thresholds: &TierThresholds,
) -> EngineResult<ScoreResult> {
    let weights = request.weights.as_ref().unwrap_or(weights);
    let thresholds = request.thresholds.as_ref().unwrap_or(thresholds);
    let result = score_factors(&request.factors, weights, thresholds)?;

    tracing::debug!(
        model_id = %request.model_id,
        tenant_id = %request.tenant_id,
        score = result.composite_score,
        tier = %result.risk_tier,
        "scored model"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use proptest::prelude::*;

    fn factors(e: f64, c: f64, f: f64, l: f64) -> RiskFactors {
        RiskFactors::new(e, c, f, l).unwrap()
    }

    #[test]
    fn test_default_weights_formula() {
        let score =
            compute_score(&factors(0.5, 1.0, 0.0, 0.4), &ScoringWeights::default()).unwrap();
        // 0.40*0.5 + 0.25*1.0 + 0.20*0.0 + 0.15*0.4
        assert!((score - 0.51).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_and_all_one() {
        let weights = ScoringWeights::default();
        assert_eq!(compute_score(&factors(0.0, 0.0, 0.0, 0.0), &weights).unwrap(), 0.0);
        let max = compute_score(&factors(1.0, 1.0, 1.0, 1.0), &weights).unwrap();
        assert!(max <= 1.0);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_factor_not_clamped() {
        let raw = RiskFactors {
            exposure: 1.2,
            regulatory_capital_impact: 0.0,
            customer_facing: 0.0,
            limitations: 0.0,
        };
        let err = compute_score(&raw, &ScoringWeights::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { ref field, .. } if field == "exposure"));
    }

    #[test]
    fn test_bad_weights_rejected() {
        let weights = ScoringWeights {
            exposure: 0.5,
            regulatory_capital_impact: 0.5,
            customer_facing: 0.5,
            limitations: 0.0,
        };
        assert!(compute_score(&factors(0.1, 0.1, 0.1, 0.1), &weights).is_err());
    }

    #[test]
    fn test_classify_inclusive_boundaries() {
        let t = TierThresholds::default();
        assert_eq!(classify_tier(0.7, &t).unwrap(), RiskTier::High);
        assert_eq!(classify_tier(0.6999999, &t).unwrap(), RiskTier::Medium);
        assert_eq!(classify_tier(0.9, &t).unwrap(), RiskTier::Critical);
        assert_eq!(classify_tier(0.8999999, &t).unwrap(), RiskTier::High);
        assert_eq!(classify_tier(0.4, &t).unwrap(), RiskTier::Medium);
        assert_eq!(classify_tier(0.3999999, &t).unwrap(), RiskTier::Low);
        assert_eq!(classify_tier(0.0, &t).unwrap(), RiskTier::Low);
        assert_eq!(classify_tier(1.0, &t).unwrap(), RiskTier::Critical);
    }

    #[test]
    fn test_classify_rejects_bad_input() {
        let t = TierThresholds::default();
        assert!(classify_tier(1.01, &t).is_err());
        assert!(classify_tier(-0.01, &t).is_err());

        let unordered = TierThresholds {
            critical: 0.5,
            high: 0.7,
            medium: 0.4,
        };
        assert!(classify_tier(0.5, &unordered).is_err());
    }

    #[test]
    fn test_rationale_lists_contributions() {
        let result = score_factors(
            &factors(1.0, 0.0, 1.0, 0.0),
            &ScoringWeights::default(),
            &TierThresholds::default(),
        )
        .unwrap();

        assert_eq!(result.rationale.len(), 4);
        assert_eq!(result.rationale[0].factor, "exposure");
        assert_eq!(result.rationale[0].contribution, 0.40);
        assert_eq!(result.rationale[1].contribution, 0.0);
        assert_eq!(result.rationale[2].contribution, 0.20);
        assert!((result.composite_score - 0.6).abs() < 1e-12);
        assert_eq!(result.risk_tier, RiskTier::Medium);
    }

    #[test]
    fn test_request_overrides() {
        let request = ScoringRequest {
            model_id: "credit-v3".to_string(),
            tenant_id: "acme".to_string(),
            factors: factors(1.0, 0.0, 0.0, 0.0),
            assessor_id: "alice".to_string(),
            weights: Some(ScoringWeights {
                exposure: 1.0,
                regulatory_capital_impact: 0.0,
                customer_facing: 0.0,
                limitations: 0.0,
            }),
            thresholds: None,
        };
        let result = score_request(&request, &ScoringWeights::default(), &TierThresholds::default())
            .unwrap();
        assert_eq!(result.composite_score, 1.0);
        assert_eq!(result.risk_tier, RiskTier::Critical);
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "model_id": "m1", "tenant_id": "t1", "assessor_id": "alice",
            "exposure": 0.5, "regulatory_capital_impact": 0.0,
            "customer_facing": 1.0, "limitations": 0.2
        }"#;
        let request: ScoringRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.factors.customer_facing, 1.0);
        assert!(request.weights.is_none());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let f = factors(0.123, 0.456, 0.789, 0.012);
        let a = compute_score(&f, &ScoringWeights::default()).unwrap();
        let b = compute_score(&f, &ScoringWeights::default()).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    proptest! {
        #[test]
        fn prop_default_weights_match_formula(
            e in 0.0f64..=1.0,
            c in 0.0f64..=1.0,
            f in 0.0f64..=1.0,
            l in 0.0f64..=1.0,
        ) {
            let score = compute_score(&factors(e, c, f, l), &ScoringWeights::default()).unwrap();
            let expected = 0.40 * e + 0.25 * c + 0.20 * f + 0.15 * l;
            prop_assert!((score - expected).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_score_always_classifiable(
            e in 0.0f64..=1.0,
            c in 0.0f64..=1.0,
            f in 0.0f64..=1.0,
            l in 0.0f64..=1.0,
        ) {
            let result = score_factors(
                &factors(e, c, f, l),
                &ScoringWeights::default(),
                &TierThresholds::default(),
            );
            prop_assert!(result.is_ok());
        }
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ensure_unit_interval, EngineError, EngineResult};
use super::engine::RiskTier;

/// Weights may drift from 1.0 by at most this much.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Main scoring configuration.
///
/// Every section is optional; missing sections fall back to the defaults.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   weights:
///     exposure: 0.40
///     regulatory_capital_impact: 0.25
///     customer_facing: 0.20
///     limitations: 0.15
///   thresholds: { critical: 0.9, high: 0.7, medium: 0.4 }
///   review_intervals: { critical: "180d", high: "365d", medium: "730d", low: "1095d" }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: Option<ScoringWeights>,

    #[serde(default)]
    pub thresholds: Option<TierThresholds>,

    /// How long a validation stays current, per tier. Format: humantime ("180d", "52w")
    #[serde(default)]
    pub review_intervals: Option<ReviewIntervals>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Some(ScoringWeights::default()),
            thresholds: Some(TierThresholds::default()),
            review_intervals: Some(ReviewIntervals::default()),
        }
    }
}

impl ScoringConfig {
    pub fn effective_weights(&self) -> ScoringWeights {
        self.weights.clone().unwrap_or_default()
    }

    pub fn effective_thresholds(&self) -> TierThresholds {
        self.thresholds.clone().unwrap_or_default()
    }

    pub fn effective_review_intervals(&self) -> ReviewIntervals {
        self.review_intervals.clone().unwrap_or_default()
    }
}

/// Factor weights. Non-negative, summing to 1.0.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringWeights {
    pub exposure: f64,
    pub regulatory_capital_impact: f64,
    pub customer_facing: f64,
    pub limitations: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            exposure: 0.40,
            regulatory_capital_impact: 0.25,
            customer_facing: 0.20,
            limitations: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Weights in factor order (exposure, regulatory capital, customer facing, limitations).
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.exposure,
            self.regulatory_capital_impact,
            self.customer_facing,
            self.limitations,
        ]
    }

    /// Sum in factor order. The score is normalised by this exact value.
    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub fn validate(&self) -> EngineResult<()> {
        let names = super::factors::FACTOR_NAMES;
        for (name, weight) in names.iter().zip(self.as_array()) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::validation(
                    format!("weights.{}", name),
                    format!("must be a non-negative number (got {})", weight),
                ));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::validation(
                "weights",
                format!("must sum to 1.0 (got {})", sum),
            ));
        }
        Ok(())
    }
}

/// Tier cut points. Each value is the inclusive lower bound of its tier;
/// anything below `medium` is `low`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TierThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            critical: 0.9,
            high: 0.7,
            medium: 0.4,
        }
    }
}

impl TierThresholds {
    pub fn validate(&self) -> EngineResult<()> {
        ensure_unit_interval("thresholds.critical", self.critical)?;
        ensure_unit_interval("thresholds.high", self.high)?;
        ensure_unit_interval("thresholds.medium", self.medium)?;
        if !(self.critical > self.high && self.high > self.medium) {
            return Err(EngineError::validation(
                "thresholds",
                format!(
                    "must be strictly ascending medium < high < critical (got {} / {} / {})",
                    self.medium, self.high, self.critical
                ),
            ));
        }
        Ok(())
    }

    /// Lower bound of a tier (`low` starts at 0.0).
    pub fn lower_bound(&self, tier: RiskTier) -> f64 {
        match tier {
            RiskTier::Critical => self.critical,
            RiskTier::High => self.high,
            RiskTier::Medium => self.medium,
            RiskTier::Low => 0.0,
        }
    }
}

/// Validation interval per tier.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReviewIntervals {
    pub critical: String,
    pub high: String,
    pub medium: String,
    pub low: String,
}

impl Default for ReviewIntervals {
    fn default() -> Self {
        Self {
            critical: "180d".to_string(),
            high: "365d".to_string(),
            medium: "730d".to_string(),
            low: "1095d".to_string(),
        }
    }
}

impl ReviewIntervals {
    pub fn raw(&self, tier: RiskTier) -> &str {
        match tier {
            RiskTier::Critical => &self.critical,
            RiskTier::High => &self.high,
            RiskTier::Medium => &self.medium,
            RiskTier::Low => &self.low,
        }
    }

    pub fn interval(&self, tier: RiskTier) -> anyhow::Result<Duration> {
        Ok(humantime::parse_duration(self.raw(tier).trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.effective_weights().exposure, 0.40);
        assert_eq!(config.effective_thresholds().high, 0.7);
        assert_eq!(config.effective_review_intervals().critical, "180d");
    }

    #[test]
    fn test_default_weights_are_valid() {
        assert!(ScoringWeights::default().validate().is_ok());
        assert!(TierThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_scoring_config_serde_roundtrip() {
        let config = ScoringConfig::default();
        let yaml = serde_saphyr::to_string(&config).unwrap();
        let parsed: ScoringConfig = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_scoring_config_parse() {
        let yaml = r#"
thresholds:
  critical: 0.85
  high: 0.65
  medium: 0.4
"#;
        let config: ScoringConfig = serde_saphyr::from_str(yaml).unwrap();
        assert!(config.weights.is_none());
        assert_eq!(config.effective_thresholds().critical, 0.85);
        // Missing weights fall back to defaults
        assert_eq!(config.effective_weights(), ScoringWeights::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "weights: { exposure: 1.0, regulatory_capital_impact: 0, customer_facing: 0, limitations: 0, extra: 1 }";
        assert!(serde_saphyr::from_str::<ScoringConfig>(yaml).is_err());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let weights = ScoringWeights {
            exposure: 0.5,
            regulatory_capital_impact: 0.25,
            customer_facing: 0.20,
            limitations: 0.15,
        };
        let err = weights.validate().unwrap_err();
        assert!(err.to_string().starts_with("weights: must sum to 1.0"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let weights = ScoringWeights {
            exposure: 1.2,
            regulatory_capital_impact: -0.2,
            customer_facing: 0.0,
            limitations: 0.0,
        };
        let err = weights.validate().unwrap_err();
        assert!(err.to_string().contains("weights.regulatory_capital_impact"));
    }

    #[test]
    fn test_thresholds_must_ascend() {
        let thresholds = TierThresholds {
            critical: 0.7,
            high: 0.7,
            medium: 0.4,
        };
        assert!(thresholds.validate().is_err());

        let thresholds = TierThresholds {
            critical: 0.9,
            high: 0.3,
            medium: 0.4,
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_review_interval_parse() {
        let intervals = ReviewIntervals::default();
        let critical = intervals.interval(RiskTier::Critical).unwrap();
        assert_eq!(critical.as_secs(), 180 * 86_400);
    }
}

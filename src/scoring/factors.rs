use serde::{Deserialize, Serialize};

use crate::error::{ensure_unit_interval, EngineError, EngineResult};

/// Factor names in weight order. Used for field paths and rationale labels.
pub const FACTOR_NAMES: [&str; 4] = [
    "exposure",
    "regulatory_capital_impact",
    "customer_facing",
    "limitations",
];

/// A complete factor vector, each value normalised to [0, 1] by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub exposure: f64,
    pub regulatory_capital_impact: f64,
    pub customer_facing: f64,
    pub limitations: f64,
}

impl RiskFactors {
    /// Build a validated factor vector. Out-of-range values are rejected, never clamped.
    pub fn new(
        exposure: f64,
        regulatory_capital_impact: f64,
        customer_facing: f64,
        limitations: f64,
    ) -> EngineResult<Self> {
        let factors = Self {
            exposure,
            regulatory_capital_impact,
            customer_facing,
            limitations,
        };
        factors.validate()?;
        Ok(factors)
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, value) in FACTOR_NAMES.iter().zip(self.as_array()) {
            ensure_unit_interval(name, value)?;
        }
        Ok(())
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.exposure,
            self.regulatory_capital_impact,
            self.customer_facing,
            self.limitations,
        ]
    }
}

/// Factor vector as recorded on an assessment. Any factor may still be missing
/// while the assessment is a draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorInputs {
    #[serde(default)]
    pub exposure: Option<f64>,
    #[serde(default)]
    pub regulatory_capital_impact: Option<f64>,
    #[serde(default)]
    pub customer_facing: Option<f64>,
    #[serde(default)]
    pub limitations: Option<f64>,
}

impl FactorInputs {
    fn as_array(&self) -> [Option<f64>; 4] {
        [
            self.exposure,
            self.regulatory_capital_impact,
            self.customer_facing,
            self.limitations,
        ]
    }

    /// Names of the factors that have not been supplied yet.
    pub fn missing(&self) -> Vec<&'static str> {
        FACTOR_NAMES
            .iter()
            .zip(self.as_array())
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn complete(&self) -> Option<RiskFactors> {
        Some(RiskFactors {
            exposure: self.exposure?,
            regulatory_capital_impact: self.regulatory_capital_impact?,
            customer_facing: self.customer_facing?,
            limitations: self.limitations?,
        })
    }
}

impl From<RiskFactors> for FactorInputs {
    fn from(f: RiskFactors) -> Self {
        Self {
            exposure: Some(f.exposure),
            regulatory_capital_impact: Some(f.regulatory_capital_impact),
            customer_facing: Some(f.customer_facing),
            limitations: Some(f.limitations),
        }
    }
}

/// Raw facts about a model, before normalisation into [`RiskFactors`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Estimated annual financial exposure influenced by the model (USD)
    pub annual_exposure_usd: f64,
    pub regulatory_capital_impact: bool,
    pub customer_facing: bool,
    pub known_limitations: u32,
}

impl ModelProfile {
    pub fn normalize(&self) -> EngineResult<RiskFactors> {
        RiskFactors::new(
            exposure_band(self.annual_exposure_usd)?,
            if self.regulatory_capital_impact { 1.0 } else { 0.0 },
            if self.customer_facing { 1.0 } else { 0.0 },
            limitation_load(self.known_limitations),
        )
    }
}

/// Map annual exposure in USD onto the normalised exposure bands.
pub fn exposure_band(usd: f64) -> EngineResult<f64> {
    if !usd.is_finite() || usd < 0.0 {
        return Err(EngineError::validation(
            "annual_exposure_usd",
            format!("must be a non-negative amount (got {})", usd),
        ));
    }
    let band = if usd >= 1_000_000_000.0 {
        1.0
    } else if usd >= 100_000_000.0 {
        0.75
    } else if usd >= 10_000_000.0 {
        0.50
    } else if usd >= 1_000_000.0 {
        0.25
    } else {
        0.10
    };
    Ok(band)
}

/// Each documented limitation adds 0.2, saturating at five.
pub fn limitation_load(count: u32) -> f64 {
    (count as f64 * 0.2).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors_reject_out_of_range() {
        let err = RiskFactors::new(0.5, 1.01, 0.0, 0.0).unwrap_err();
        assert!(err.to_string().starts_with("regulatory_capital_impact:"));
        assert!(RiskFactors::new(-0.1, 0.0, 0.0, 0.0).is_err());
        assert!(RiskFactors::new(0.0, 0.0, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_factors_accept_bounds() {
        assert!(RiskFactors::new(0.0, 1.0, 0.0, 1.0).is_ok());
    }

    #[test]
    fn test_inputs_missing() {
        let inputs = FactorInputs {
            exposure: Some(0.5),
            regulatory_capital_impact: None,
            customer_facing: Some(0.0),
            limitations: None,
        };
        assert_eq!(inputs.missing(), vec!["regulatory_capital_impact", "limitations"]);
        assert!(inputs.complete().is_none());
    }

    #[test]
    fn test_inputs_complete_roundtrip() {
        let factors = RiskFactors::new(0.1, 0.2, 0.3, 0.4).unwrap();
        let inputs = FactorInputs::from(factors);
        assert!(inputs.missing().is_empty());
        assert_eq!(inputs.complete(), Some(factors));
    }

    #[test]
    fn test_exposure_bands() {
        assert_eq!(exposure_band(2_000_000_000.0).unwrap(), 1.0);
        assert_eq!(exposure_band(100_000_000.0).unwrap(), 0.75);
        assert_eq!(exposure_band(50_000_000.0).unwrap(), 0.50);
        assert_eq!(exposure_band(1_000_000.0).unwrap(), 0.25);
        assert_eq!(exposure_band(10.0).unwrap(), 0.10);
        assert!(exposure_band(-1.0).is_err());
    }

    #[test]
    fn test_limitation_load_saturates() {
        assert_eq!(limitation_load(0), 0.0);
        assert!((limitation_load(2) - 0.4).abs() < 1e-12);
        assert_eq!(limitation_load(5), 1.0);
        assert_eq!(limitation_load(12), 1.0);
    }

    #[test]
    fn test_profile_normalize() {
        let profile = ModelProfile {
            annual_exposure_usd: 250_000_000.0,
            regulatory_capital_impact: true,
            customer_facing: false,
            known_limitations: 1,
        };
        let factors = profile.normalize().unwrap();
        assert_eq!(factors.exposure, 0.75);
        assert_eq!(factors.regulatory_capital_impact, 1.0);
        assert_eq!(factors.customer_facing, 0.0);
        assert!((factors.limitations - 0.2).abs() < 1e-12);
    }
}

use super::config::ScoringConfig;
use super::engine::RiskTier;
use crate::error::EngineError;

fn describe(err: EngineError) -> String {
    match err {
        EngineError::Validation { field, constraint } => {
            format!("scoring.{}: {}", field, constraint)
        }
        other => format!("scoring: {}", other),
    }
}

/// Validate scoring configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(ref weights) = config.weights {
        if let Err(e) = weights.validate() {
            errors.push(describe(e));
        }
    }

    if let Some(ref thresholds) = config.thresholds {
        if let Err(e) = thresholds.validate() {
            errors.push(describe(e));
        }
    }

    if let Some(ref intervals) = config.review_intervals {
        for tier in [RiskTier::Critical, RiskTier::High, RiskTier::Medium, RiskTier::Low] {
            if let Err(e) = intervals.interval(tier) {
                errors.push(format!(
                    "scoring.review_intervals.{}: invalid '{}' - {}",
                    tier,
                    intervals.raw(tier),
                    e
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

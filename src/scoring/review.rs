//! Follow-up obligations implied by a score: validation cadence, scope,
//! required documentation and audit findings.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{ReviewIntervals, TierThresholds};
use super::engine::{RiskTier, ScoreResult};
use super::factors::RiskFactors;

/// Models older than this get a full re-validation in their scope.
pub const FULL_REVALIDATION_AGE_DAYS: u32 = 730;

const BASE_SCOPE: &[&str] = &["Conceptual soundness review", "Outcome analysis"];

const ELEVATED_SCOPE: &[&str] = &[
    "Data integrity and quality assessment",
    "Process verification and replication",
    "Sensitivity analysis",
    "Benchmarking against challenger models",
    "Ongoing monitoring review",
];

const CRITICAL_DOCUMENTS: &[&str] = &[
    "Model development document (MDD)",
    "Independent validation report",
    "Model risk committee approval",
    "Production deployment attestation",
    "Ongoing monitoring plan",
    "Compensating controls documentation",
    "Model limitation inventory",
    "Challenger model comparison",
    "Performance benchmarks",
    "Regulatory capital impact analysis",
];

const HIGH_DOCUMENTS: &[&str] = &[
    "Model development document (MDD)",
    "Independent validation report",
    "Ongoing monitoring plan",
    "Model limitation inventory",
    "Challenger model comparison",
    "Performance benchmarks",
];

const MEDIUM_DOCUMENTS: &[&str] = &[
    "Model development document (MDD)",
    "Validation report (internal or independent)",
    "Ongoing monitoring plan",
    "Model limitation inventory",
];

const LOW_DOCUMENTS: &[&str] = &[
    "Model development document (MDD)",
    "Validation report (internal)",
    "Ongoing monitoring plan",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPlan {
    pub independent_validation_required: bool,
    pub interval_days: i64,
    pub next_review_due: DateTime<Utc>,
    /// Areas the next validation must cover
    pub validation_scope: Vec<String>,
    pub documentation_requirements: Vec<String>,
    /// Days since the model went into production, when known
    pub model_age_days: Option<u32>,
    /// The model is older than its tier's validation interval.
    /// Always false when the age is unknown.
    pub overdue_validation: bool,
    pub overdue_by_days: i64,
    pub findings: Vec<String>,
}

/// Build the review plan for a scored assessment.
pub fn plan_review(
    factors: &RiskFactors,
    result: &ScoreResult,
    thresholds: &TierThresholds,
    intervals: &ReviewIntervals,
    assessed_at: DateTime<Utc>,
    model_age_days: Option<u32>,
) -> Result<ReviewPlan> {
    let tier = result.risk_tier;
    let interval = intervals.interval(tier).with_context(|| {
        format!(
            "invalid review interval '{}' for tier {}",
            intervals.raw(tier),
            tier
        )
    })?;
    let interval = chrono::Duration::from_std(interval)
        .context("review interval out of range")?;
    let next_review_due = assessed_at
        .checked_add_signed(interval)
        .context("review interval out of range")?;
    let interval_days = interval.num_days();
    let overdue_by_days = model_age_days
        .map(|age| (i64::from(age) - interval_days).max(0))
        .unwrap_or(0);

    let plan = ReviewPlan {
        independent_validation_required: matches!(tier, RiskTier::High | RiskTier::Critical)
            || factors.regulatory_capital_impact > 0.0,
        interval_days,
        next_review_due,
        validation_scope: validation_scope(tier, factors, model_age_days),
        documentation_requirements: documentation_requirements(tier)
            .iter()
            .map(|d| d.to_string())
            .collect(),
        model_age_days,
        overdue_validation: overdue_by_days > 0,
        overdue_by_days,
        findings: findings(factors, result.composite_score, thresholds),
    };

    if plan.overdue_validation {
        tracing::warn!(
            tier = %tier,
            overdue_by_days = plan.overdue_by_days,
            "model validation overdue"
        );
    }
    Ok(plan)
}

/// What the next validation has to cover.
pub fn validation_scope(
    tier: RiskTier,
    factors: &RiskFactors,
    model_age_days: Option<u32>,
) -> Vec<String> {
    let mut scope: Vec<String> = BASE_SCOPE.iter().map(|s| s.to_string()).collect();
    if matches!(tier, RiskTier::High | RiskTier::Critical) {
        scope.extend(ELEVATED_SCOPE.iter().map(|s| s.to_string()));
    }
    if factors.regulatory_capital_impact > 0.0 {
        scope.push("Regulatory capital calculation review".to_string());
    }
    if factors.customer_facing > 0.0 {
        scope.push("ECOA/Regulation B adverse action notice review".to_string());
    }
    if model_age_days.is_some_and(|age| age > FULL_REVALIDATION_AGE_DAYS) {
        scope.push("Full re-validation due to model age over two years".to_string());
    }
    scope
}

/// Documents a model of this tier must have on file.
pub fn documentation_requirements(tier: RiskTier) -> &'static [&'static str] {
    match tier {
        RiskTier::Critical => CRITICAL_DOCUMENTS,
        RiskTier::High => HIGH_DOCUMENTS,
        RiskTier::Medium => MEDIUM_DOCUMENTS,
        RiskTier::Low => LOW_DOCUMENTS,
    }
}

/// Human-readable audit notes for an assessment.
pub fn findings(factors: &RiskFactors, score: f64, thresholds: &TierThresholds) -> Vec<String> {
    let mut notes = Vec::new();

    if factors.regulatory_capital_impact > 0.0 {
        notes.push(
            "Model influences regulatory capital calculations; heightened scrutiny required."
                .to_string(),
        );
    }
    if factors.customer_facing > 0.0 {
        notes.push(
            "Model output is customer-facing; adverse action notice requirements may apply."
                .to_string(),
        );
    }
    if factors.limitations >= 0.8 {
        notes.push(
            "Model carries a heavy limitation load; compensating controls and enhanced monitoring required."
                .to_string(),
        );
    }
    if score >= thresholds.high {
        notes.push(
            "High composite risk score; validation by a party independent of model development is mandatory."
                .to_string(),
        );
    }

    notes
}

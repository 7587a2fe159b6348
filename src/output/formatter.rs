use std::io::IsTerminal;
use owo_colors::OwoColorize;

use crate::lifecycle::{AssessmentStatus, RiskAssessment, StoredAssessment};
use crate::scoring::{ReviewPlan, RiskTier, ScoreResult};
use crate::synth::GenerationReport;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a composite score with fixed precision ("0.685")
pub fn format_score(score: f64) -> String {
    format!("{:.3}", score)
}

/// Tier label, colored by severity
pub fn format_tier(tier: RiskTier, use_colors: bool) -> String {
    let label = tier.as_str().to_uppercase();
    if !use_colors {
        return label;
    }
    match tier {
        RiskTier::Critical => label.red().bold().to_string(),
        RiskTier::High => label.red().to_string(),
        RiskTier::Medium => label.yellow().to_string(),
        RiskTier::Low => label.green().to_string(),
    }
}

fn format_status(status: AssessmentStatus, use_colors: bool) -> String {
    let label = status.as_str();
    if !use_colors {
        return label.to_string();
    }
    match status {
        AssessmentStatus::Validated => label.green().to_string(),
        AssessmentStatus::RevisionRequested | AssessmentStatus::Stale => label.yellow().to_string(),
        AssessmentStatus::Draft | AssessmentStatus::Submitted => label.cyan().to_string(),
    }
}

/// Score, tier and per-factor rationale, plus the review plan if given
pub fn format_score_result(
    result: &ScoreResult,
    plan: Option<&ReviewPlan>,
    use_colors: bool,
) -> String {
    let mut lines = vec![format!(
        "Score: {}  Tier: {}",
        format_score(result.composite_score),
        format_tier(result.risk_tier, use_colors)
    )];

    for c in &result.rationale {
        lines.push(format!(
            "  {:<26} {:>5.2} x {:>4.2} = {:>6.4}",
            c.factor, c.value, c.weight, c.contribution
        ));
    }

    if let Some(plan) = plan {
        let validation = if plan.independent_validation_required {
            "required"
        } else {
            "not required"
        };
        lines.push(format!("Independent validation: {}", validation));
        lines.push(format!(
            "Next review due: {} ({} days)",
            plan.next_review_due.format("%Y-%m-%d"),
            plan.interval_days
        ));
        if plan.overdue_validation {
            let overdue = format!("Validation overdue by {} days", plan.overdue_by_days);
            if use_colors {
                lines.push(overdue.red().bold().to_string());
            } else {
                lines.push(overdue);
            }
        }
        lines.push("Validation scope:".to_string());
        for item in &plan.validation_scope {
            lines.push(format!("  * {}", item));
        }
        lines.push("Required documentation:".to_string());
        for doc in &plan.documentation_requirements {
            lines.push(format!("  * {}", doc));
        }
        for finding in &plan.findings {
            if use_colors {
                lines.push(format!("  - {}", finding.dimmed()));
            } else {
                lines.push(format!("  - {}", finding));
            }
        }
    }

    lines.join("\n")
}

/// Multi-line view of one assessment
pub fn format_assessment(record: &StoredAssessment, use_colors: bool) -> String {
    let a = &record.assessment;
    let id = if use_colors {
        a.id.to_string().bold().to_string()
    } else {
        a.id.to_string()
    };
    let mut lines = vec![
        id,
        format!("  Model: {}  Tenant: {}", a.model_id, a.tenant_id),
        format!(
            "  Status: {}  Revision: {}  Version: {}",
            format_status(a.status, use_colors),
            a.revision,
            record.version
        ),
        format!("  {}", score_summary(a, use_colors)),
        format!("  Assessor: {}", a.assessor_id),
    ];
    if let Some(ref validator) = a.validator_id {
        lines.push(format!("  Validator: {}", validator));
    }
    if let Some(prev) = a.supersedes {
        lines.push(format!("  Supersedes: {}", prev));
    }
    let missing = a.factors.missing();
    if !missing.is_empty() {
        lines.push(format!("  Missing factors: {}", missing.join(", ")));
    }
    lines.push(format!("  Created: {}", a.created_at.format("%Y-%m-%d %H:%M UTC")));
    lines.join("\n")
}

fn score_summary(a: &RiskAssessment, use_colors: bool) -> String {
    match (a.composite_score, a.risk_tier) {
        (Some(score), Some(tier)) => format!(
            "Score: {}  Tier: {}",
            format_score(score),
            format_tier(tier, use_colors)
        ),
        _ => "Score: (not scored)".to_string(),
    }
}

/// One line per assessment: id, model, status, tier, score
pub fn format_assessment_table(records: &[StoredAssessment], use_colors: bool) -> String {
    if records.is_empty() {
        return "No assessments found.".to_string();
    }

    records
        .iter()
        .map(|r| {
            let a = &r.assessment;
            let tier = a
                .risk_tier
                .map(|t| format_tier(t, use_colors))
                .unwrap_or_else(|| "-".to_string());
            let score = a
                .composite_score
                .map(format_score)
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{}  {:<20} {:<18} {:<8} {:>5}",
                a.id,
                a.model_id,
                format_status(a.status, use_colors),
                tier,
                score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of a generation run, for stderr
pub fn format_generation_report(report: &GenerationReport, use_colors: bool) -> String {
    let last = report
        .last_emitted_index
        .map(|i| i.to_string())
        .unwrap_or_else(|| "none".to_string());
    let headline = if report.cancelled {
        let msg = format!("Cancelled. Resume with --resume-from {}", report.next_index());
        if use_colors {
            msg.yellow().to_string()
        } else {
            msg
        }
    } else {
        let msg = "Done.".to_string();
        if use_colors {
            msg.green().to_string()
        } else {
            msg
        }
    };
    format!(
        "{}\n  Seed: {}\n  Rows: {} of {} (from index {}, last {})\n  Fraud rows: {}",
        headline,
        report.seed,
        report.emitted,
        report.requested,
        report.start_index,
        last,
        report.fraud_emitted
    )
}

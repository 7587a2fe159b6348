use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::lifecycle::{
    AssessmentStore, EventDescriptor, EventPublisher, LifecycleAction, RiskAssessment,
    StoredAssessment,
};
use crate::scoring::{plan_review, FactorInputs, ReviewPlan, ScoreResult, ScoringConfig};

/// A persisted assessment plus the scoring output produced on the way in.
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub record: StoredAssessment,
    pub score: Option<ScoreResult>,
    pub plan: Option<ReviewPlan>,
}

/// A persisted transition and the event it produced.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub record: StoredAssessment,
    pub event: EventDescriptor,
}

/// Score a new draft (when its factors are complete) and store it.
///
/// Drafts with missing factors are stored unscored; they can be revised later.
pub fn record_assessment(
    store: &dyn AssessmentStore,
    draft: RiskAssessment,
    scoring: &ScoringConfig,
    assessed_at: DateTime<Utc>,
) -> Result<AssessmentOutcome> {
    let (assessment, score, plan) = match draft.factors.complete() {
        Some(factors) => {
            let (scored, result) = draft.scored(
                &scoring.effective_weights(),
                &scoring.effective_thresholds(),
            )?;
            let plan = plan_review(
                &factors,
                &result,
                &scoring.effective_thresholds(),
                &scoring.effective_review_intervals(),
                assessed_at,
                None,
            )?;
            (scored, Some(result), Some(plan))
        }
        None => {
            tracing::debug!(missing = ?draft.factors.missing(), "storing unscored draft");
            (draft, None, None)
        }
    };

    let version = store
        .save(&assessment, None)
        .with_context(|| format!("Failed to store assessment {}", assessment.id))?;

    Ok(AssessmentOutcome {
        record: StoredAssessment {
            version,
            assessment,
        },
        score,
        plan,
    })
}

pub fn load_assessment(store: &dyn AssessmentStore, id: &Uuid) -> Result<StoredAssessment> {
    store
        .load(id)
        .with_context(|| format!("Failed to load assessment {}", id))?
        .with_context(|| format!("Assessment {} not found", id))
}

/// Apply a lifecycle action, persist the new state, then publish the event.
///
/// The save is conditional on the version that was loaded, so a concurrent
/// writer makes this fail instead of being overwritten. Publishing happens only
/// after the save succeeded; a publisher failure is logged and does not undo it.
pub fn apply_action(
    store: &dyn AssessmentStore,
    publisher: &dyn EventPublisher,
    id: &Uuid,
    action: LifecycleAction,
    actor_id: &str,
) -> Result<TransitionRecord> {
    let current = load_assessment(store, id)?;
    let outcome = current.assessment.apply(action, actor_id)?;

    let version = store
        .save(&outcome.assessment, Some(current.version))
        .with_context(|| format!("Failed to store assessment {}", id))?;

    if let Err(e) = publisher.publish(&outcome.event) {
        tracing::warn!(topic = %outcome.event.topic(), error = %e, "event publish failed");
    }

    Ok(TransitionRecord {
        record: StoredAssessment {
            version,
            assessment: outcome.assessment,
        },
        event: outcome.event,
    })
}

/// Factors from `overrides` where given, otherwise from `base`.
pub fn merge_factors(base: &FactorInputs, overrides: &FactorInputs) -> FactorInputs {
    FactorInputs {
        exposure: overrides.exposure.or(base.exposure),
        regulatory_capital_impact: overrides
            .regulatory_capital_impact
            .or(base.regulatory_capital_impact),
        customer_facing: overrides.customer_facing.or(base.customer_facing),
        limitations: overrides.limitations.or(base.limitations),
    }
}

/// Create and store the next revision of an assessment. The previous record is not modified.
pub fn revise_assessment(
    store: &dyn AssessmentStore,
    id: &Uuid,
    overrides: &FactorInputs,
    assessor_id: &str,
    scoring: &ScoringConfig,
    assessed_at: DateTime<Utc>,
) -> Result<AssessmentOutcome> {
    let previous = load_assessment(store, id)?;
    let factors = merge_factors(&previous.assessment.factors, overrides);
    let draft = previous.assessment.revise(factors, assessor_id);
    tracing::info!(
        previous = %id,
        revision = draft.revision,
        new_id = %draft.id,
        "assessment revised"
    );
    record_assessment(store, draft, scoring, assessed_at)
}

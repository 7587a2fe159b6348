use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::scoring::{
    score_factors, FactorInputs, RiskTier, ScoreResult, ScoringRequest, ScoringWeights,
    TierThresholds,
};
use super::transition::transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Submitted,
    Validated,
    RevisionRequested,
    Stale,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Draft => "draft",
            AssessmentStatus::Submitted => "submitted",
            AssessmentStatus::Validated => "validated",
            AssessmentStatus::RevisionRequested => "revision_requested",
            AssessmentStatus::Stale => "stale",
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Submit,
    Validate,
    RequestRevision,
    /// Return a revision-requested assessment to draft.
    Reopen,
    /// Expire a validated assessment. Triggered by external policy, never by the engine.
    MarkStale,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Submit => "submit",
            LifecycleAction::Validate => "validate",
            LifecycleAction::RequestRevision => "request_revision",
            LifecycleAction::Reopen => "reopen",
            LifecycleAction::MarkStale => "mark_stale",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "submit" => Ok(LifecycleAction::Submit),
            "validate" => Ok(LifecycleAction::Validate),
            "request_revision" => Ok(LifecycleAction::RequestRevision),
            "reopen" => Ok(LifecycleAction::Reopen),
            "mark_stale" => Ok(LifecycleAction::MarkStale),
            other => Err(format!(
                "unknown action '{}' (expected submit, validate, request_revision, reopen, mark_stale)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssessmentSubmitted,
    AssessmentValidated,
    RevisionRequested,
    AssessmentReopened,
    AssessmentMarkedStale,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AssessmentSubmitted => "assessment_submitted",
            EventKind::AssessmentValidated => "assessment_validated",
            EventKind::RevisionRequested => "revision_requested",
            EventKind::AssessmentReopened => "assessment_reopened",
            EventKind::AssessmentMarkedStale => "assessment_marked_stale",
        }
    }
}

impl From<LifecycleAction> for EventKind {
    fn from(action: LifecycleAction) -> Self {
        match action {
            LifecycleAction::Submit => EventKind::AssessmentSubmitted,
            LifecycleAction::Validate => EventKind::AssessmentValidated,
            LifecycleAction::RequestRevision => EventKind::RevisionRequested,
            LifecycleAction::Reopen => EventKind::AssessmentReopened,
            LifecycleAction::MarkStale => EventKind::AssessmentMarkedStale,
        }
    }
}

/// Describes an accepted transition. Publishing it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub kind: EventKind,
    pub assessment_id: Uuid,
    pub tenant_id: String,
    pub old_status: AssessmentStatus,
    pub new_status: AssessmentStatus,
    pub actor_id: String,
}

impl EventDescriptor {
    pub fn topic(&self) -> String {
        format!("finserv.model_risk.{}", self.kind.as_str())
    }
}

/// Result of applying a lifecycle action: the next record and its event.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub assessment: RiskAssessment,
    pub event: EventDescriptor,
}

/// A model-risk assessment record.
///
/// Records are append-only: lifecycle actions produce the next state of the same
/// assessment, corrections produce a new revision with its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub model_id: String,
    pub tenant_id: String,
    pub revision: u32,
    #[serde(default)]
    pub supersedes: Option<Uuid>,
    pub factors: FactorInputs,
    #[serde(default)]
    pub composite_score: Option<f64>,
    #[serde(default)]
    pub risk_tier: Option<RiskTier>,
    pub status: AssessmentStatus,
    pub assessor_id: String,
    #[serde(default)]
    pub validator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Create an unscored draft.
    pub fn draft(
        model_id: impl Into<String>,
        tenant_id: impl Into<String>,
        assessor_id: impl Into<String>,
        factors: FactorInputs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            model_id: model_id.into(),
            tenant_id: tenant_id.into(),
            revision: 1,
            supersedes: None,
            factors,
            composite_score: None,
            risk_tier: None,
            status: AssessmentStatus::Draft,
            assessor_id: assessor_id.into(),
            validator_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create a scored draft from a scoring request and its result.
    pub fn from_scored_request(request: &ScoringRequest, result: &ScoreResult) -> Self {
        let mut assessment = Self::draft(
            request.model_id.clone(),
            request.tenant_id.clone(),
            request.assessor_id.clone(),
            request.factors.into(),
        );
        assessment.composite_score = Some(result.composite_score);
        assessment.risk_tier = Some(result.risk_tier);
        assessment
    }

    /// Compute the score of a draft whose factors are complete.
    pub fn scored(
        &self,
        weights: &ScoringWeights,
        thresholds: &TierThresholds,
    ) -> EngineResult<(Self, ScoreResult)> {
        if self.status != AssessmentStatus::Draft {
            return Err(EngineError::validation(
                "status",
                format!("only draft assessments can be scored (is {})", self.status),
            ));
        }
        let factors = self.factors.complete().ok_or_else(|| missing_factors(&self.factors))?;
        let result = score_factors(&factors, weights, thresholds)?;

        let mut next = self.clone();
        next.composite_score = Some(result.composite_score);
        next.risk_tier = Some(result.risk_tier);
        Ok((next, result))
    }

    /// Apply a lifecycle action on behalf of `actor_id`.
    pub fn apply(
        &self,
        action: LifecycleAction,
        actor_id: &str,
    ) -> EngineResult<TransitionOutcome> {
        if actor_id.trim().is_empty() {
            return Err(EngineError::validation("actor_id", "must not be empty"));
        }
        let new_status = transition(self.status, action, &self.assessor_id, actor_id)?;

        if action == LifecycleAction::Submit {
            if self.factors.complete().is_none() {
                return Err(missing_factors(&self.factors));
            }
            if self.composite_score.is_none() || self.risk_tier.is_none() {
                return Err(EngineError::validation(
                    "composite_score",
                    "must be computed before submit",
                ));
            }
        }

        let mut next = self.clone();
        next.status = new_status;
        if action == LifecycleAction::Validate {
            next.validator_id = Some(actor_id.to_string());
        }

        let event = EventDescriptor {
            kind: action.into(),
            assessment_id: self.id,
            tenant_id: self.tenant_id.clone(),
            old_status: self.status,
            new_status,
            actor_id: actor_id.to_string(),
        };

        tracing::info!(
            assessment_id = %self.id,
            action = %action,
            from = %self.status,
            to = %new_status,
            actor = actor_id,
            "assessment transition accepted"
        );

        Ok(TransitionOutcome {
            assessment: next,
            event,
        })
    }

    /// Start a corrected version of this assessment. The current record is left untouched.
    pub fn revise(&self, factors: FactorInputs, assessor_id: impl Into<String>) -> Self {
        let mut next = Self::draft(
            self.model_id.clone(),
            self.tenant_id.clone(),
            assessor_id,
            factors,
        );
        next.revision = self.revision + 1;
        next.supersedes = Some(self.id);
        next
    }
}

fn missing_factors(inputs: &FactorInputs) -> EngineError {
    EngineError::validation(
        "factors",
        format!("missing {}", inputs.missing().join(", ")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::RiskFactors;

    fn scored_draft() -> RiskAssessment {
        let draft = RiskAssessment::draft(
            "credit-v3",
            "acme",
            "alice",
            RiskFactors::new(0.5, 1.0, 0.0, 0.2).unwrap().into(),
        );
        draft
            .scored(&ScoringWeights::default(), &TierThresholds::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("submit".parse::<LifecycleAction>().unwrap(), LifecycleAction::Submit);
        assert_eq!(
            "request-revision".parse::<LifecycleAction>().unwrap(),
            LifecycleAction::RequestRevision
        );
        assert!("approve".parse::<LifecycleAction>().is_err());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&AssessmentStatus::RevisionRequested).unwrap();
        assert_eq!(json, "\"revision_requested\"");
    }

    #[test]
    fn test_full_happy_path() {
        let draft = scored_draft();
        let submitted = draft.apply(LifecycleAction::Submit, "alice").unwrap();
        assert_eq!(submitted.assessment.status, AssessmentStatus::Submitted);
        assert_eq!(submitted.event.kind, EventKind::AssessmentSubmitted);

        let validated = submitted
            .assessment
            .apply(LifecycleAction::Validate, "bob")
            .unwrap();
        assert_eq!(validated.assessment.status, AssessmentStatus::Validated);
        assert_eq!(validated.assessment.validator_id.as_deref(), Some("bob"));
        assert_eq!(validated.event.old_status, AssessmentStatus::Submitted);
        assert_eq!(validated.event.new_status, AssessmentStatus::Validated);
        assert_eq!(validated.event.actor_id, "bob");
        assert_eq!(validated.event.topic(), "finserv.model_risk.assessment_validated");
    }

    #[test]
    fn test_self_validation_rejected() {
        let submitted = scored_draft()
            .apply(LifecycleAction::Submit, "alice")
            .unwrap()
            .assessment;
        let err = submitted.apply(LifecycleAction::Validate, "alice").unwrap_err();
        assert!(matches!(err, EngineError::SegregationOfDuties { .. }));
    }

    #[test]
    fn test_submit_requires_complete_factors() {
        let draft = RiskAssessment::draft(
            "m",
            "t",
            "alice",
            FactorInputs {
                exposure: Some(0.5),
                ..FactorInputs::default()
            },
        );
        let err = draft.apply(LifecycleAction::Submit, "alice").unwrap_err();
        assert_eq!(
            err.to_string(),
            "factors: missing regulatory_capital_impact, customer_facing, limitations"
        );
    }

    #[test]
    fn test_submit_requires_score() {
        let draft = RiskAssessment::draft(
            "m",
            "t",
            "alice",
            RiskFactors::new(0.5, 0.5, 0.5, 0.5).unwrap().into(),
        );
        let err = draft.apply(LifecycleAction::Submit, "alice").unwrap_err();
        assert!(err.to_string().starts_with("composite_score:"));
    }

    #[test]
    fn test_scoring_only_in_draft() {
        let submitted = scored_draft()
            .apply(LifecycleAction::Submit, "alice")
            .unwrap()
            .assessment;
        assert!(submitted
            .scored(&ScoringWeights::default(), &TierThresholds::default())
            .is_err());
    }

    #[test]
    fn test_apply_leaves_original_untouched() {
        let draft = scored_draft();
        let _ = draft.apply(LifecycleAction::Submit, "alice").unwrap();
        assert_eq!(draft.status, AssessmentStatus::Draft);
    }

    #[test]
    fn test_revise_creates_new_version() {
        let original = scored_draft();
        let revised = original.revise(FactorInputs::default(), "carol");
        assert_ne!(revised.id, original.id);
        assert_eq!(revised.revision, 2);
        assert_eq!(revised.supersedes, Some(original.id));
        assert_eq!(revised.status, AssessmentStatus::Draft);
        assert!(revised.composite_score.is_none());
        assert_eq!(revised.assessor_id, "carol");
    }

    #[test]
    fn test_empty_actor_rejected() {
        let err = scored_draft().apply(LifecycleAction::Submit, "  ").unwrap_err();
        assert!(err.to_string().starts_with("actor_id:"));
    }
}

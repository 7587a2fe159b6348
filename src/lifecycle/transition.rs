use super::types::{AssessmentStatus, LifecycleAction};
use crate::error::{EngineError, EngineResult};

use AssessmentStatus::*;
use LifecycleAction::*;

/// Every legal (state, action) -> state move. Anything not listed is rejected.
const TRANSITIONS: &[(AssessmentStatus, LifecycleAction, AssessmentStatus)] = &[
    (Draft, Submit, Submitted),
    (Submitted, Validate, Validated),
    (Submitted, RequestRevision, RevisionRequested),
    (RevisionRequested, Reopen, Draft),
    (Validated, MarkStale, Stale),
];

/// Look up the target state without any actor checks.
pub fn next_status(current: AssessmentStatus, action: LifecycleAction) -> Option<AssessmentStatus> {
    TRANSITIONS
        .iter()
        .find(|(from, act, _)| *from == current && *act == action)
        .map(|(_, _, to)| *to)
}

/// Actions that are legal from `current`.
pub fn allowed_actions(current: AssessmentStatus) -> Vec<LifecycleAction> {
    TRANSITIONS
        .iter()
        .filter(|(from, _, _)| *from == current)
        .map(|(_, act, _)| *act)
        .collect()
}

/// Resolve a transition, enforcing segregation of duties on `validate`.
pub fn transition(
    current: AssessmentStatus,
    action: LifecycleAction,
    assessor_id: &str,
    actor_id: &str,
) -> EngineResult<AssessmentStatus> {
    let next = next_status(current, action).ok_or(EngineError::InvalidTransition {
        state: current,
        action,
    })?;

    if action == Validate && actor_id == assessor_id {
        return Err(EngineError::SegregationOfDuties {
            assessor_id: assessor_id.to_string(),
            actor_id: actor_id.to_string(),
        });
    }

    Ok(next)
}

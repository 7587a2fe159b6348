use thiserror::Error;

use crate::lifecycle::{AssessmentStatus, LifecycleAction};

/// Errors raised by the scoring, lifecycle and generation engines.
///
/// Everything except `PartialGeneration` is detected before any work is done,
/// so a failed call never leaves partial side effects behind.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{field}: {constraint}")]
    Validation { field: String, constraint: String },

    #[error("cannot {action} an assessment in state {state}")]
    InvalidTransition {
        state: AssessmentStatus,
        action: LifecycleAction,
    },

    #[error("segregation of duties: {actor_id} authored this assessment and cannot validate it (assessor {assessor_id})")]
    SegregationOfDuties { assessor_id: String, actor_id: String },

    #[error("count: {requested} exceeds max_transactions_per_request ({max})")]
    ResourceLimit { requested: u64, max: u64 },

    #[error("generation stopped before index {next_index}: {source}")]
    PartialGeneration {
        /// Last row the sink accepted; `None` if nothing was written.
        last_emitted_index: Option<u64>,
        /// First index to resume from.
        next_index: u64,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reject anything that is not a finite value in `[0, 1]`.
pub(crate) fn ensure_unit_interval(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::validation(
            field,
            format!("must be within [0, 1] (got {})", value),
        ))
    }
}

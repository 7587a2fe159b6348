pub mod config;
pub mod engine;
pub mod factors;
pub mod review;
pub mod validation;

pub use config::*;
pub use engine::{
    classify_tier, compute_score, score_factors, score_request, FactorContribution, RiskTier,
    ScoreResult, ScoringRequest,
};
pub use factors::{FactorInputs, ModelProfile, RiskFactors, FACTOR_NAMES};
pub use review::{
    documentation_requirements, findings, plan_review, validation_scope, ReviewPlan,
    FULL_REVALIDATION_AGE_DAYS,
};
pub use validation::validate_scoring;

//! Model-risk scoring with an auditable assessment lifecycle, and reproducible
//! fraud-labeled synthetic transaction generation.

pub mod assess;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod output;
pub mod scoring;
pub mod synth;

pub use error::{EngineError, EngineResult};

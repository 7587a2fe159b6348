pub mod amount;
pub mod config;
pub mod fraud;
pub mod generator;
pub mod identity;
pub mod sink;
pub mod spec;
pub mod stream;

pub use amount::{amounts_bounded, lognormal_moments, sample, MAX_AMOUNT};
pub use config::{validate_generation, FraudConfig, GenerationConfig, GenerationSettings};
pub use fraud::{select_fraud_indices, FraudPattern, FraudPlan, FraudRules, PatternWeights};
pub use generator::{
    generate, GenerationReport, SyntheticTransaction, TransactionGenerator, Transactions,
};
pub use sink::{CsvSink, TransactionSink, VecSink};
pub use spec::{derive_seed, GenerationRequest, GenerationSpec};
pub use stream::{stream, DeterministicStream, Lane};

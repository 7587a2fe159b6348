pub mod events;
pub mod store;
pub mod transition;
pub mod types;

pub use events::{EventPublisher, LogPublisher, RecordingPublisher};
pub use store::{AssessmentStore, JsonFileStore, MemoryStore, StoreError, StoredAssessment};
pub use transition::{allowed_actions, next_status, transition};
pub use types::{
    AssessmentStatus, EventDescriptor, EventKind, LifecycleAction, RiskAssessment,
    TransitionOutcome,
};

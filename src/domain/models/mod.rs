//! Domain models: the entities the engine reasons about.

pub mod config;
pub mod corner_case;
pub mod diagnosis;
pub mod document;
pub mod event;
pub mod extraction;
pub mod review;
pub mod task;
pub mod workflow;

pub use config::{Config, ConfidenceWeights, DatabaseConfig, EngineConfig, LoggingConfig, ModelConfig};
pub use corner_case::{CornerCase, ResolutionKind, SharedPattern};
pub use diagnosis::{
    EvidenceWindow, FailureSignature, IssueClass, OverlapResolution, RemediationDirective,
};
pub use document::{Document, ParsedPage};
pub use event::{EventKind, EvolutionEvent};
pub use extraction::{
    ConfidenceBreakdown, ConfidenceSignals, ExecutionStatus, ExtractionRecord, FieldConfidence,
    InferenceCost,
};
pub use review::{
    FeedbackKind, FeedbackRecord, FieldVerdict, ReviewVerdict, SamplingReason, VerdictClass,
};
pub use task::{Task, TaskStatus};
pub use workflow::{FieldDef, FieldStrategy, SchemaVersion, WorkflowVersion};

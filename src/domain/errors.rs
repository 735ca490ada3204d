//! Domain errors for the anyextract engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the extraction engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Extraction not found: {0}")]
    ExtractionNotFound(Uuid),

    #[error("Workflow version not found: {0}")]
    WorkflowVersionNotFound(Uuid),

    #[error("No active workflow version for task {0}")]
    NoActiveWorkflow(Uuid),

    #[error("No active schema version for task {0}")]
    NoActiveSchema(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Version activation conflict on task {task_id}: another activation is in flight")]
    VersionActivationConflict { task_id: Uuid },

    #[error("Task {task_id} is locked at iteration {iteration}; explicit override required")]
    IterationExhausted { task_id: Uuid, iteration: u32 },

    #[error("Unknown tier '{tier}' for field '{field}'")]
    UnknownTier { field: String, tier: String },

    #[error("Invalid field rule for '{field}': {reason}")]
    InvalidFieldRule { field: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Model invocation failed: {0}")]
    ModelInvocationFailed(String),

    #[error("Review failed: {0}")]
    ReviewFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Evolution cycle aborted before {stage}")]
    CycleAborted { stage: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SchemaVersion, WorkflowVersion};

/// Repository port for schema and workflow version history.
///
/// History is append-only: versions are inserted and activated, never
/// mutated or deleted. Activation swings the single active pointer for the
/// task atomically.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn insert_schema(&self, schema: &SchemaVersion) -> DomainResult<()>;

    async fn get_schema(&self, id: Uuid) -> DomainResult<Option<SchemaVersion>>;

    async fn active_schema(&self, task_id: Uuid) -> DomainResult<Option<SchemaVersion>>;

    /// Deactivate any active schema for the task and mark this one active,
    /// in a single transaction.
    async fn activate_schema(&self, task_id: Uuid, schema_id: Uuid) -> DomainResult<()>;

    async fn insert_workflow(&self, workflow: &WorkflowVersion) -> DomainResult<()>;

    async fn get_workflow(&self, id: Uuid) -> DomainResult<Option<WorkflowVersion>>;

    async fn active_workflow(&self, task_id: Uuid) -> DomainResult<Option<WorkflowVersion>>;

    /// All workflow versions for a task, newest first.
    async fn list_workflows(&self, task_id: Uuid) -> DomainResult<Vec<WorkflowVersion>>;

    /// Atomically swing the active pointer to the given version. The
    /// previously active version stays addressable for rollback. Fails with
    /// `VersionActivationConflict` if another activation for the task holds
    /// the activation lease.
    async fn activate_workflow(&self, task_id: Uuid, workflow_id: Uuid) -> DomainResult<()>;
}

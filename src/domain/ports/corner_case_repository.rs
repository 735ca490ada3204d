use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::CornerCase;

/// Repository port for task-scoped corner cases.
#[async_trait]
pub trait CornerCaseRepository: Send + Sync {
    async fn insert(&self, case: &CornerCase) -> DomainResult<()>;

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<CornerCase>>;

    async fn list_for_field(&self, task_id: Uuid, field: &str) -> DomainResult<Vec<CornerCase>>;
}

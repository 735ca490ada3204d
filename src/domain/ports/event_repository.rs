use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::EvolutionEvent;

/// Repository port for the append-only evolution audit feed.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append(&self, event: &EvolutionEvent) -> DomainResult<()>;

    /// Events for a task, oldest first.
    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<EvolutionEvent>>;
}

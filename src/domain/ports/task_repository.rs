use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

/// Filters for querying tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub include_archived: bool,
}

/// Repository port for task persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task.
    async fn insert(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Get a task by its unique name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Task>>;

    /// Update an existing task (status, iteration, active version pointers).
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// List tasks with optional filters.
    async fn list(&self, filters: TaskFilters) -> DomainResult<Vec<Task>>;

    /// Archive a task. Tasks are never deleted.
    async fn archive(&self, id: Uuid) -> DomainResult<()>;
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Document;

/// Repository port for documents and their parsed content.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &Document) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Document>>;

    /// Find a document by content hash within a task, for dedup.
    async fn get_by_hash(&self, task_id: Uuid, file_hash: &str) -> DomainResult<Option<Document>>;

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Document>>;
}

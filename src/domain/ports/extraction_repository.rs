use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ExtractionRecord;

/// Repository port for extraction records.
///
/// Records are immutable facts: there is no update operation. A re-run
/// inserts a new record that supersedes the old one by recency.
#[async_trait]
pub trait ExtractionRepository: Send + Sync {
    async fn insert(&self, record: &ExtractionRecord) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ExtractionRecord>>;

    /// All records produced for a task at a given iteration.
    async fn list_for_iteration(&self, task_id: Uuid, iteration: u32)
        -> DomainResult<Vec<ExtractionRecord>>;

    /// Most recent record for a document, if any.
    async fn latest_for_document(&self, document_id: Uuid)
        -> DomainResult<Option<ExtractionRecord>>;
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FeedbackRecord, ReviewVerdict};

/// Repository port for review verdicts and human feedback.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert_verdict(&self, verdict: &ReviewVerdict) -> DomainResult<()>;

    async fn verdicts_for_extraction(&self, extraction_id: Uuid)
        -> DomainResult<Vec<ReviewVerdict>>;

    /// All verdicts over a task's records at a given iteration — the
    /// diagnosis evidence window.
    async fn verdicts_for_iteration(&self, task_id: Uuid, iteration: u32)
        -> DomainResult<Vec<ReviewVerdict>>;

    async fn insert_feedback(&self, feedback: &FeedbackRecord) -> DomainResult<()>;

    async fn feedback_for_verdict(&self, verdict_id: Uuid) -> DomainResult<Vec<FeedbackRecord>>;

    /// All feedback attached to verdicts of a task at a given iteration.
    async fn feedback_for_iteration(&self, task_id: Uuid, iteration: u32)
        -> DomainResult<Vec<FeedbackRecord>>;
}

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::SharedPattern;

/// Repository port for the cross-task shared pattern library.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Insert a pattern, or replace the implementation of an existing one
    /// with the same name.
    async fn upsert(&self, pattern: &SharedPattern) -> DomainResult<()>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<SharedPattern>>;

    /// Patterns at or above a confidence floor, optionally filtered by
    /// category, ordered by confidence descending.
    async fn list(&self, category: Option<&str>, min_confidence: f64)
        -> DomainResult<Vec<SharedPattern>>;

    /// Write back usage/success counters and the recomputed confidence.
    async fn update_stats(&self, pattern: &SharedPattern) -> DomainResult<()>;
}

//! Cross-task shared pattern library.
//!
//! Task-local corner cases that prove out get promoted into a library other
//! tasks can consult. Confidence is the running success rate of reuse, so a
//! pattern that stops working sinks back below the suggestion floor on its
//! own.

use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CornerCase, SharedPattern};
use crate::domain::ports::PatternRepository;

/// Confidence floor below which patterns are not suggested for reuse.
pub const SUGGESTION_FLOOR: f64 = 0.6;

pub struct PatternLibrary {
    repository: Arc<dyn PatternRepository>,
}

impl PatternLibrary {
    pub fn new(repository: Arc<dyn PatternRepository>) -> Self {
        Self { repository }
    }

    /// Promote a resolved corner case into the shared library under
    /// `<category>/<field>`. Re-promotion replaces the implementation and
    /// resets nothing: the usage record survives.
    pub async fn promote(&self, case: &CornerCase, category: &str) -> DomainResult<SharedPattern> {
        let implementation = case.resolution.clone().ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "corner case '{}' has no resolution to promote",
                case.description
            ))
        })?;

        let name = format!("{category}/{}", case.field);
        let pattern = match self.repository.get_by_name(&name).await? {
            Some(mut existing) => {
                existing.implementation = implementation;
                existing.implementation_kind = case.resolution_kind;
                existing.description = Some(case.description.clone());
                existing
            }
            None => {
                let mut p = SharedPattern::new(&name, category, implementation, case.resolution_kind);
                p.description = Some(case.description.clone());
                p
            }
        };

        self.repository.upsert(&pattern).await?;
        info!(pattern = %pattern.name, "promoted corner case to shared library");
        Ok(pattern)
    }

    /// Record one reuse outcome and persist the recomputed confidence.
    pub async fn record_outcome(&self, name: &str, success: bool) -> DomainResult<SharedPattern> {
        let mut pattern = self
            .repository
            .get_by_name(name)
            .await?
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown pattern '{name}'")))?;
        pattern.record_use(success);
        self.repository.update_stats(&pattern).await?;
        Ok(pattern)
    }

    /// Reuse candidates for a category, best first.
    pub async fn suggest(&self, category: Option<&str>) -> DomainResult<Vec<SharedPattern>> {
        self.repository.list(category, SUGGESTION_FLOOR).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ResolutionKind;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryPatterns {
        patterns: Mutex<HashMap<String, SharedPattern>>,
    }

    #[async_trait]
    impl PatternRepository for InMemoryPatterns {
        async fn upsert(&self, pattern: &SharedPattern) -> DomainResult<()> {
            self.patterns
                .lock()
                .unwrap()
                .insert(pattern.name.clone(), pattern.clone());
            Ok(())
        }

        async fn get_by_name(&self, name: &str) -> DomainResult<Option<SharedPattern>> {
            Ok(self.patterns.lock().unwrap().get(name).cloned())
        }

        async fn list(
            &self,
            category: Option<&str>,
            min_confidence: f64,
        ) -> DomainResult<Vec<SharedPattern>> {
            let mut found: Vec<SharedPattern> = self
                .patterns
                .lock()
                .unwrap()
                .values()
                .filter(|p| category.is_none_or(|c| p.category == c))
                .filter(|p| p.confidence >= min_confidence)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            Ok(found)
        }

        async fn update_stats(&self, pattern: &SharedPattern) -> DomainResult<()> {
            self.upsert(pattern).await
        }
    }

    fn resolved_case() -> CornerCase {
        CornerCase::new(Uuid::new_v4(), "date", "two-digit years")
            .with_pattern(r"\d{2}/\d{2}/\d{2}")
            .with_resolution(r"(\d{2}/\d{2}/\d{2})", ResolutionKind::Regex)
    }

    #[tokio::test]
    async fn test_promote_and_lookup() {
        let library = PatternLibrary::new(Arc::new(InMemoryPatterns::default()));
        let pattern = library.promote(&resolved_case(), "date").await.unwrap();
        assert_eq!(pattern.name, "date/date");
        assert!((pattern.confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_promote_requires_resolution() {
        let library = PatternLibrary::new(Arc::new(InMemoryPatterns::default()));
        let unresolved = CornerCase::new(Uuid::new_v4(), "date", "unclear");
        let err = library.promote(&unresolved, "date").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_repromotion_keeps_usage_record() {
        let library = PatternLibrary::new(Arc::new(InMemoryPatterns::default()));
        library.promote(&resolved_case(), "date").await.unwrap();
        library.record_outcome("date/date", true).await.unwrap();
        library.record_outcome("date/date", true).await.unwrap();

        let again = library.promote(&resolved_case(), "date").await.unwrap();
        assert_eq!(again.usage_count, 2);
        assert!((again.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_suggestions_respect_confidence_floor() {
        let library = PatternLibrary::new(Arc::new(InMemoryPatterns::default()));
        library.promote(&resolved_case(), "date").await.unwrap();

        // Fresh pattern sits at 0.5, below the floor.
        assert!(library.suggest(Some("date")).await.unwrap().is_empty());

        library.record_outcome("date/date", true).await.unwrap();
        let suggested = library.suggest(Some("date")).await.unwrap();
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].name, "date/date");
    }
}

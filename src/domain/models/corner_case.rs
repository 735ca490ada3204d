//! Corner cases and the cross-task shared pattern library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a corner-case resolution or pattern is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Extra instruction injected into the model prompt.
    Prompt,
    /// A regex applied to the source text.
    Regex,
    /// A fixed replacement value.
    Value,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Regex => "regex",
            Self::Value => "value",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prompt" => Some(Self::Prompt),
            "regex" => Some(Self::Regex),
            "value" => Some(Self::Value),
            _ => None,
        }
    }
}

/// A named exception pattern scoped to one task.
///
/// Checked before standard extraction on every run; a match bypasses or
/// overrides the default field logic for that document. Created and mutated
/// only by remediation directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerCase {
    pub id: Uuid,
    pub task_id: Uuid,
    pub field: String,
    pub description: String,
    /// Pattern matched against document text to detect the case.
    pub pattern: Option<String>,
    /// How to resolve the field when the pattern matches.
    pub resolution: Option<String>,
    pub resolution_kind: ResolutionKind,
    pub created_at: DateTime<Utc>,
}

impl CornerCase {
    pub fn new(task_id: Uuid, field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            field: field.into(),
            description: description.into(),
            pattern: None,
            resolution: None,
            resolution_kind: ResolutionKind::Prompt,
            created_at: Utc::now(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>, kind: ResolutionKind) -> Self {
        self.resolution = Some(resolution.into());
        self.resolution_kind = kind;
        self
    }
}

/// A cross-task reusable extraction pattern, promoted from task-local corner
/// cases or field logic once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPattern {
    pub id: Uuid,
    /// Unique name across tasks.
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub implementation: String,
    pub implementation_kind: ResolutionKind,
    /// Running success rate; rises with successful reuse, decays on failure.
    pub confidence: f64,
    pub usage_count: u64,
    pub success_count: u64,
    pub created_at: DateTime<Utc>,
}

impl SharedPattern {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        implementation: impl Into<String>,
        kind: ResolutionKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            description: None,
            implementation: implementation.into(),
            implementation_kind: kind,
            confidence: 0.5,
            usage_count: 0,
            success_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Record one use and recompute confidence as the running success rate.
    pub fn record_use(&mut self, success: bool) {
        self.usage_count += 1;
        if success {
            self.success_count += 1;
        }
        self.confidence = self.success_count as f64 / self.usage_count as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_confidence_tracks_success_rate() {
        let mut pattern =
            SharedPattern::new("iso-date", "date", r"\d{4}-\d{2}-\d{2}", ResolutionKind::Regex);
        pattern.record_use(true);
        pattern.record_use(true);
        pattern.record_use(false);
        assert!((pattern.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(pattern.usage_count, 3);
    }

    #[test]
    fn test_confidence_decays_on_failure() {
        let mut pattern = SharedPattern::new("p", "c", "x", ResolutionKind::Value);
        pattern.record_use(true);
        let high = pattern.confidence;
        pattern.record_use(false);
        assert!(pattern.confidence < high);
    }
}

//! Review verdicts and human feedback.
//!
//! Verdicts come from a reviewer independent of the extraction path and are
//! advisory only: they never mutate the extraction record they assess.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correctness classification for a field or a whole extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictClass {
    Correct,
    Partial,
    Incorrect,
    Missing,
}

impl VerdictClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Partial => "partial",
            Self::Incorrect => "incorrect",
            Self::Missing => "missing",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "correct" => Some(Self::Correct),
            "partial" => Some(Self::Partial),
            "incorrect" => Some(Self::Incorrect),
            "missing" => Some(Self::Missing),
            _ => None,
        }
    }

    /// Whether this class counts as a failure for diagnosis purposes.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Correct)
    }
}

/// Why a record was selected for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingReason {
    /// Iteration 0 or forced full review.
    Full,
    /// Selected first for low confidence.
    Priority,
    /// Independent random draw for regression detection.
    Random,
    /// Field flagged for renewed full sampling after a tier rollback.
    RegressionCheck,
}

impl SamplingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Priority => "priority",
            Self::Random => "random",
            Self::RegressionCheck => "regression_check",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" => Some(Self::Full),
            "priority" => Some(Self::Priority),
            "random" => Some(Self::Random),
            "regression_check" => Some(Self::RegressionCheck),
            _ => None,
        }
    }
}

/// Per-field assessment inside a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    pub field: String,
    pub class: VerdictClass,
    /// What the reviewer believes the value should be, when it can say.
    pub expected: Option<String>,
    pub reasoning: Option<String>,
    pub score: Option<f64>,
}

/// Independent assessment of one extraction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub id: Uuid,
    pub extraction_id: Uuid,
    pub overall: VerdictClass,
    pub overall_score: Option<f64>,
    pub field_verdicts: Vec<FieldVerdict>,
    pub reasoning: Option<String>,
    pub sampling_reason: SamplingReason,
    pub created_at: DateTime<Utc>,
}

impl ReviewVerdict {
    pub fn new(extraction_id: Uuid, overall: VerdictClass, sampling_reason: SamplingReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            extraction_id,
            overall,
            overall_score: None,
            field_verdicts: Vec::new(),
            reasoning: None,
            sampling_reason,
            created_at: Utc::now(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.overall_score = Some(score);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, class: VerdictClass) -> Self {
        self.field_verdicts.push(FieldVerdict {
            field: field.into(),
            class,
            expected: None,
            reasoning: None,
            score: None,
        });
        self
    }

    /// The verdict class assigned to a named field, if reviewed.
    pub fn field_class(&self, field: &str) -> Option<VerdictClass> {
        self.field_verdicts
            .iter()
            .find(|fv| fv.field == field)
            .map(|fv| fv.class)
    }
}

/// Kind of human feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Correction,
    Approval,
    Rejection,
    Comment,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correction => "correction",
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::Comment => "comment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "correction" => Some(Self::Correction),
            "approval" => Some(Self::Approval),
            "rejection" => Some(Self::Rejection),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// A human correction or approval tied to a verdict. Always additive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub verdict_id: Uuid,
    pub kind: FeedbackKind,
    pub field: Option<String>,
    pub original_value: Option<String>,
    pub corrected_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(verdict_id: Uuid, kind: FeedbackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            verdict_id,
            kind,
            field: None,
            original_value: None,
            corrected_value: None,
            comment: None,
            created_at: Utc::now(),
        }
    }

    pub fn correction(
        verdict_id: Uuid,
        field: impl Into<String>,
        original: impl Into<String>,
        corrected: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(verdict_id, FeedbackKind::Correction);
        record.field = Some(field.into());
        record.original_value = Some(original.into());
        record.corrected_value = Some(corrected.into());
        record
    }

    pub fn rejection(verdict_id: Uuid, field: impl Into<String>, comment: impl Into<String>) -> Self {
        let mut record = Self::new(verdict_id, FeedbackKind::Rejection);
        record.field = Some(field.into());
        record.comment = Some(comment.into());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_class_lookup() {
        let verdict = ReviewVerdict::new(Uuid::new_v4(), VerdictClass::Partial, SamplingReason::Full)
            .with_field("date", VerdictClass::Incorrect)
            .with_field("amount", VerdictClass::Correct);
        assert_eq!(verdict.field_class("date"), Some(VerdictClass::Incorrect));
        assert_eq!(verdict.field_class("broker"), None);
    }

    #[test]
    fn test_failure_classes() {
        assert!(!VerdictClass::Correct.is_failure());
        assert!(VerdictClass::Partial.is_failure());
        assert!(VerdictClass::Incorrect.is_failure());
        assert!(VerdictClass::Missing.is_failure());
    }
}

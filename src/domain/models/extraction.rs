//! Extraction record domain model.
//!
//! One record per (document, workflow-version) execution. Records are
//! immutable once written: a re-run writes a new record that supersedes the
//! old one, it never edits in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution outcome of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Partial,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Raw per-field signals consumed by the confidence evaluator.
///
/// Every component is optional; a missing signal is substituted with a
/// conservative 0.5 at scoring time rather than failing the computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSignals {
    /// The model's self-reported confidence for this value.
    pub self_confidence: Option<f64>,
    /// Prior for the extraction method (deterministic rule > vision > text).
    pub method_prior: Option<f64>,
    /// Historical accuracy of this field at its current tier.
    pub historical_accuracy: Option<f64>,
    /// Parse/OCR quality estimate for the source region.
    pub source_clarity: Option<f64>,
    /// Whether a known corner case matched this document.
    pub corner_case_matched: Option<bool>,
}

/// Effective component values after defaulting, kept for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub self_confidence: f64,
    pub method_prior: f64,
    pub historical_accuracy: f64,
    pub source_clarity: f64,
    pub corner_case_match: f64,
}

/// Composite confidence for one field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    /// Weighted composite, clamped to [0,1].
    pub score: f64,
    pub breakdown: ConfidenceBreakdown,
}

/// Inference cost accrued by one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceCost {
    pub model_calls: u32,
    pub tokens: u64,
}

impl InferenceCost {
    pub fn add(&mut self, calls: u32, tokens: u64) {
        self.model_calls += calls;
        self.tokens += tokens;
    }
}

/// One (document, workflow-version) execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub workflow_version_id: Uuid,
    pub schema_version_id: Uuid,
    /// Task iteration this run belongs to.
    pub iteration: u32,
    /// Extracted values keyed by field name.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Raw signals per field, as supplied by the execution path.
    pub signals: BTreeMap<String, ConfidenceSignals>,
    /// Derived composite confidence per field.
    pub field_confidences: BTreeMap<String, FieldConfidence>,
    /// Mean of field composites, if any were computed.
    pub overall_confidence: Option<f64>,
    pub cost: InferenceCost,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExtractionRecord {
    pub fn new(
        document_id: Uuid,
        workflow_version_id: Uuid,
        schema_version_id: Uuid,
        iteration: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            workflow_version_id,
            schema_version_id,
            iteration,
            fields: BTreeMap::new(),
            signals: BTreeMap::new(),
            field_confidences: BTreeMap::new(),
            overall_confidence: None,
            cost: InferenceCost::default(),
            status: ExecutionStatus::Success,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether any field composite sits below the given floor.
    pub fn any_field_below(&self, floor: f64) -> bool {
        self.field_confidences.values().any(|c| c.score < floor)
    }

    /// Field names whose composite sits below the given floor.
    pub fn fields_below(&self, floor: f64) -> Vec<&str> {
        self.field_confidences
            .iter()
            .filter(|(_, c)| c.score < floor)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_below_floor() {
        let mut record = ExtractionRecord::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 0);
        let breakdown = ConfidenceBreakdown {
            self_confidence: 0.5,
            method_prior: 0.5,
            historical_accuracy: 0.5,
            source_clarity: 0.5,
            corner_case_match: 0.7,
        };
        record
            .field_confidences
            .insert("date".into(), FieldConfidence { score: 0.4, breakdown });
        record
            .field_confidences
            .insert("amount".into(), FieldConfidence { score: 0.9, breakdown });

        assert!(record.any_field_below(0.5));
        assert_eq!(record.fields_below(0.5), vec!["date"]);
    }
}

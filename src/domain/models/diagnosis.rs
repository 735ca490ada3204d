//! Diagnosis outputs: failure signatures and remediation directives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::review::VerdictClass;

/// A recurring failure shape: the same field failing the same way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FailureSignature {
    pub field: String,
    pub class: VerdictClass,
}

impl FailureSignature {
    pub fn new(field: impl Into<String>, class: VerdictClass) -> Self {
        Self { field: field.into(), class }
    }
}

impl std::fmt::Display for FailureSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.field, self.class.as_str())
    }
}

/// How to classify a field whose corner-case match and systemic-fraction
/// evidence cross in the same window. Human rejections override this and
/// always count toward the systemic tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapResolution {
    FavorSystemic,
    FavorCornerCase,
}

impl Default for OverlapResolution {
    fn default() -> Self {
        Self::FavorSystemic
    }
}

/// Remediation class for a diagnosed failure cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueClass {
    /// Pipeline defect recurring above the frequency threshold; warrants a
    /// workflow rewrite.
    Systemic,
    /// Isolated exception; record a corner case instead of rewriting.
    CornerCase,
}

impl IssueClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Systemic => "systemic",
            Self::CornerCase => "corner_case",
        }
    }
}

/// Summary of the evidence a directive rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceWindow {
    /// Reviewed documents in the window.
    pub reviewed: u32,
    /// Distinct reviewed documents exhibiting the signature.
    pub affected: u32,
    /// Explicit human rejections counted toward the tally.
    pub rejections: u32,
}

impl EvidenceWindow {
    /// Affected fraction over reviewed documents.
    pub fn fraction(&self) -> f64 {
        if self.reviewed == 0 {
            return 0.0;
        }
        f64::from(self.affected) / f64::from(self.reviewed)
    }
}

/// Directive emitted by the diagnosis classifier and consumed by the
/// pipeline-rewrite collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationDirective {
    pub id: Uuid,
    pub task_id: Uuid,
    pub class: IssueClass,
    pub signature: FailureSignature,
    pub evidence: EvidenceWindow,
    /// For corner cases: pattern sketch detected from the failing documents.
    pub pattern: Option<String>,
    /// For corner cases: human-provided correction, when one exists.
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RemediationDirective {
    pub fn new(
        task_id: Uuid,
        class: IssueClass,
        signature: FailureSignature,
        evidence: EvidenceWindow,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            class,
            signature,
            evidence,
            pattern: None,
            resolution: None,
            created_at: Utc::now(),
        }
    }
}

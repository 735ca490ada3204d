//! Schema and workflow version snapshots.
//!
//! Versions form an immutable, append-only history with monotonically
//! increasing numbers and content-addressable hashes. Activating version N+1
//! never deletes version N; prior versions stay addressable for rollback and
//! diff.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::models::config::ConfidenceWeights;

/// One named datum in the active schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// string | number | date | list | boolean | text
    pub field_type: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub examples: Vec<String>,
    /// Free-form hint carried into model prompts.
    pub extraction_hint: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            description: None,
            required: false,
            examples: Vec::new(),
            extraction_hint: None,
        }
    }
}

/// Immutable snapshot of the field schema for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub id: Uuid,
    pub task_id: Uuid,
    pub version: u32,
    pub fields: Vec<FieldDef>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SchemaVersion {
    pub fn new(task_id: Uuid, version: u32, fields: Vec<FieldDef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            version,
            fields,
            is_active: false,
            created_at: Utc::now(),
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Execution strategy registered for one field.
///
/// Strategies are resolved through the handler registry; new behavior is
/// added by registering new handler implementations, never by executing
/// generated code at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldStrategy {
    /// Invoke the model assigned at the given ladder position.
    ModelTier { tier: usize },
    /// Apply a deterministic capture rule to the source text. Migration
    /// candidates always carry a fallback model tier, invoked when the rule
    /// fails to match.
    DeterministicRule { pattern: String, fallback_tier: usize },
    /// Resolve via the task's corner-case table, falling back to a model tier
    /// when no case matches.
    CornerCaseLookup { fallback_tier: usize },
}

impl FieldStrategy {
    /// The model-ladder position this strategy bills against, i.e. the tier
    /// used when its primary path does not resolve.
    pub fn effective_tier(&self) -> usize {
        match self {
            Self::ModelTier { tier } => *tier,
            Self::DeterministicRule { fallback_tier, .. }
            | Self::CornerCaseLookup { fallback_tier } => *fallback_tier,
        }
    }

    /// Whether this strategy executes without inference on its primary path.
    /// Rule capture and corner-case lookup both bill a model only through
    /// their fallback tier.
    pub fn is_zero_inference(&self) -> bool {
        !matches!(self, Self::ModelTier { .. })
    }
}

/// Immutable snapshot of pipeline logic: the per-field strategy set, the
/// model-tier ladder it indexes into, and the confidence weights in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub id: Uuid,
    pub task_id: Uuid,
    pub version: u32,
    pub strategies: BTreeMap<String, FieldStrategy>,
    /// Ordered worker-model ladder, most capable first.
    pub tier_ladder: Vec<String>,
    pub confidence_weights: ConfidenceWeights,
    /// Content hash of the strategy set + ladder, for diff and audit.
    pub snapshot_hash: String,
    /// Opaque reference from the external version-control collaborator.
    pub vcs_ref: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersion {
    pub fn new(
        task_id: Uuid,
        version: u32,
        strategies: BTreeMap<String, FieldStrategy>,
        tier_ladder: Vec<String>,
        confidence_weights: ConfidenceWeights,
    ) -> Self {
        let snapshot_hash = Self::compute_hash(&strategies, &tier_ladder);
        Self {
            id: Uuid::new_v4(),
            task_id,
            version,
            strategies,
            tier_ladder,
            confidence_weights,
            snapshot_hash,
            vcs_ref: None,
            is_active: false,
            created_at: Utc::now(),
        }
    }

    /// Hash of the canonical JSON of (strategies, ladder). BTreeMap keys are
    /// ordered, so serialization is stable.
    pub fn compute_hash(strategies: &BTreeMap<String, FieldStrategy>, ladder: &[String]) -> String {
        let canonical = serde_json::json!({
            "strategies": strategies,
            "tier_ladder": ladder,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        format!("{digest:x}")
    }

    /// Per-field model-tier assignment view (ladder position each field
    /// bills against).
    pub fn tier_assignments(&self) -> BTreeMap<String, usize> {
        self.strategies
            .iter()
            .map(|(field, strategy)| (field.clone(), strategy.effective_tier()))
            .collect()
    }

    /// Model name for a field under this version's ladder.
    pub fn model_for(&self, field: &str) -> Option<&str> {
        let tier = self.strategies.get(field)?.effective_tier();
        self.tier_ladder.get(tier).map(String::as_str)
    }

    /// Derive the successor snapshot with a replaced strategy set. Keeps the
    /// ladder and weights, bumps the version number, recomputes the hash.
    pub fn successor(&self, strategies: BTreeMap<String, FieldStrategy>) -> Self {
        Self::new(
            self.task_id,
            self.version + 1,
            strategies,
            self.tier_ladder.clone(),
            self.confidence_weights,
        )
    }
}

//! Evolution audit events.
//!
//! Append-only record of every trigger decision, classification outcome, and
//! result — the system's memory of why it changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of decision or change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Bootstrap,
    SchemaUpdate,
    WorkflowUpdate,
    EvolutionTriggered,
    /// A directive was recorded but not auto-applied (locked task).
    EvolutionRefused,
    CornerCaseAdded,
    PatternPromoted,
    ModelDowngrade,
    CodeMigration,
    /// A downgraded or migrated field failed its accuracy bar post-hoc.
    TierRollback,
    VersionActivated,
    /// Re-verification failed; the active pointer went back to the prior version.
    VersionRolledBack,
    WeightsCalibrated,
    TaskLocked,
    /// Explicit human override re-opened a locked task.
    LockOverridden,
    TaskFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::SchemaUpdate => "schema_update",
            Self::WorkflowUpdate => "workflow_update",
            Self::EvolutionTriggered => "evolution_triggered",
            Self::EvolutionRefused => "evolution_refused",
            Self::CornerCaseAdded => "corner_case_added",
            Self::PatternPromoted => "pattern_promoted",
            Self::ModelDowngrade => "model_downgrade",
            Self::CodeMigration => "code_migration",
            Self::TierRollback => "tier_rollback",
            Self::VersionActivated => "version_activated",
            Self::VersionRolledBack => "version_rolled_back",
            Self::WeightsCalibrated => "weights_calibrated",
            Self::TaskLocked => "task_locked",
            Self::LockOverridden => "lock_overridden",
            Self::TaskFailed => "task_failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bootstrap" => Some(Self::Bootstrap),
            "schema_update" => Some(Self::SchemaUpdate),
            "workflow_update" => Some(Self::WorkflowUpdate),
            "evolution_triggered" => Some(Self::EvolutionTriggered),
            "evolution_refused" => Some(Self::EvolutionRefused),
            "corner_case_added" => Some(Self::CornerCaseAdded),
            "pattern_promoted" => Some(Self::PatternPromoted),
            "model_downgrade" => Some(Self::ModelDowngrade),
            "code_migration" => Some(Self::CodeMigration),
            "tier_rollback" => Some(Self::TierRollback),
            "version_activated" => Some(Self::VersionActivated),
            "version_rolled_back" => Some(Self::VersionRolledBack),
            "weights_calibrated" => Some(Self::WeightsCalibrated),
            "task_locked" => Some(Self::TaskLocked),
            "lock_overridden" => Some(Self::LockOverridden),
            "task_failed" => Some(Self::TaskFailed),
            _ => None,
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub id: Uuid,
    pub task_id: Uuid,
    pub kind: EventKind,
    /// Task iteration at the time of the event.
    pub iteration: u32,
    /// What prompted the event.
    pub trigger: Option<serde_json::Value>,
    /// What was changed.
    pub mutation: Option<serde_json::Value>,
    /// How it turned out.
    pub outcome: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl EvolutionEvent {
    pub fn new(task_id: Uuid, kind: EventKind, iteration: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            kind,
            iteration,
            trigger: None,
            mutation: None,
            outcome: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_trigger(mut self, trigger: serde_json::Value) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_mutation(mut self, mutation: serde_json::Value) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn with_outcome(mut self, outcome: serde_json::Value) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

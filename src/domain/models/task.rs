//! Task domain model.
//!
//! A task is one extraction goal over a document set. It owns the iteration
//! counter and the active schema/workflow version pointers; everything else
//! hangs off it as append-only facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an extraction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Initial schema and workflow are being derived from sample documents.
    Bootstrapping,
    /// Normal extraction runs with adaptive review sampling.
    Running,
    /// A remediation directive is being applied and re-verified.
    Evolving,
    /// Iteration bound reached; workflow frozen, directives recorded only.
    Locked,
    /// Unrecoverable error.
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Bootstrapping
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Running => "running",
            Self::Evolving => "evolving",
            Self::Locked => "locked",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bootstrapping" => Some(Self::Bootstrapping),
            "running" => Some(Self::Running),
            "evolving" => Some(Self::Evolving),
            "locked" => Some(Self::Locked),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Valid transitions from this status. `Failed` is additionally reachable
    /// from any non-terminal state via [`Task::fail`].
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Bootstrapping => vec![Self::Running, Self::Failed],
            Self::Running => vec![Self::Evolving, Self::Locked, Self::Failed],
            Self::Evolving => vec![Self::Running, Self::Failed],
            // Leaving Locked requires an explicit external override.
            Self::Locked => vec![Self::Evolving, Self::Failed],
            Self::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// One extraction goal over a document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Unique human-readable name
    pub name: String,
    /// What this task extracts
    pub description: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Completed evolving cycles so far
    pub iteration: u32,
    /// Bound after which the task locks
    pub max_iteration: u32,
    /// Active schema version (exactly one while the task is live)
    pub active_schema_version: Option<Uuid>,
    /// Active workflow version (exactly one while the task is live)
    pub active_workflow_version: Option<Uuid>,
    /// Tasks are archived, never deleted
    pub archived: bool,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// Version for optimistic locking
    pub version: u64,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            status: TaskStatus::default(),
            iteration: 0,
            max_iteration: 20,
            active_schema_version: None,
            active_workflow_version: None,
            archived: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Set the iteration bound.
    pub fn with_max_iteration(mut self, max_iteration: u32) -> Self {
        self.max_iteration = max_iteration;
        self
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, rejecting anything outside the adjacency
    /// list. Transitions are never applied silently.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), crate::domain::errors::DomainError> {
        if !self.can_transition_to(new_status) {
            return Err(crate::domain::errors::DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "not in adjacency list".to_string(),
            });
        }
        self.status = new_status;
        self.touch();
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state.
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
            self.touch();
        }
    }

    /// Whether the iteration bound has been reached.
    pub fn iterations_exhausted(&self) -> bool {
        self.iteration >= self.max_iteration
    }

    /// Advance the iteration counter by exactly one.
    pub fn advance_iteration(&mut self) {
        self.iteration += 1;
        self.touch();
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Task name cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if self.max_iteration == 0 {
            return Err("max_iteration must be at least 1".to_string());
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

//! `anyextract observe` - read-only views over task state and the audit trail.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::FieldStrategy;
use crate::domain::ports::{
    CornerCaseRepository, EventRepository, ReviewRepository, WorkflowRepository,
};
use crate::infrastructure::database::{
    SqliteCornerCaseRepository, SqliteEventRepository, SqliteReviewRepository,
    SqliteTaskRepository, SqliteWorkflowRepository,
};

#[derive(Args, Debug)]
pub struct ObserveArgs {
    #[command(subcommand)]
    pub command: ObserveCommands,
}

#[derive(Subcommand, Debug)]
pub enum ObserveCommands {
    /// Task status, iteration, and active version summary
    Status {
        /// Task name or ID
        task: String,
    },
    /// Audit trail of evolution events
    Events {
        /// Task name or ID
        task: String,
        /// Show only the most recent N events
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Review verdicts recorded for an iteration
    Verdicts {
        /// Task name or ID
        task: String,
        /// Iteration to inspect (defaults to the task's current iteration)
        #[arg(short, long)]
        iteration: Option<u32>,
    },
    /// Workflow version history
    Versions {
        /// Task name or ID
        task: String,
    },
    /// Corner cases recorded against the task
    Corners {
        /// Task name or ID
        task: String,
        /// Restrict to one field
        #[arg(short, long)]
        field: Option<String>,
    },
}

#[derive(Debug, serde::Serialize)]
struct StatusOutput {
    name: String,
    status: String,
    iteration: u32,
    max_iteration: u32,
    schema_version: Option<u32>,
    workflow_version: Option<u32>,
    snapshot_hash: Option<String>,
    fields: Vec<FieldAssignment>,
}

#[derive(Debug, serde::Serialize)]
struct FieldAssignment {
    field: String,
    strategy: String,
    model: Option<String>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Task: {} [{}]", self.name, self.status),
            format!("Iteration: {}/{}", self.iteration, self.max_iteration),
            format!(
                "Schema v{} / Workflow v{}",
                self.schema_version.map_or("-".to_string(), |v| v.to_string()),
                self.workflow_version.map_or("-".to_string(), |v| v.to_string()),
            ),
        ];
        if let Some(hash) = &self.snapshot_hash {
            lines.push(format!("Snapshot: {}", &hash[..12]));
        }
        if !self.fields.is_empty() {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_header(["FIELD", "STRATEGY", "MODEL"]);
            for f in &self.fields {
                table.add_row([
                    f.field.clone(),
                    f.strategy.clone(),
                    f.model.clone().unwrap_or_default(),
                ]);
            }
            lines.push(format!("{table}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct EventListOutput {
    events: Vec<EventEntry>,
    total: usize,
}

#[derive(Debug, serde::Serialize)]
struct EventEntry {
    kind: String,
    iteration: u32,
    at: String,
    trigger: Option<serde_json::Value>,
    mutation: Option<serde_json::Value>,
    outcome: Option<serde_json::Value>,
}

impl CommandOutput for EventListOutput {
    fn to_human(&self) -> String {
        if self.events.is_empty() {
            return "No events recorded.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["WHEN", "ITER", "EVENT", "DETAIL"]);
        for e in &self.events {
            let detail = e
                .mutation
                .as_ref()
                .or(e.trigger.as_ref())
                .or(e.outcome.as_ref())
                .map(|v| truncate(&v.to_string(), 48))
                .unwrap_or_default();
            table.add_row([
                e.at.clone(),
                e.iteration.to_string(),
                e.kind.clone(),
                detail,
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct VerdictListOutput {
    iteration: u32,
    verdicts: Vec<VerdictEntry>,
    total: usize,
}

#[derive(Debug, serde::Serialize)]
struct VerdictEntry {
    id: String,
    extraction_id: String,
    overall: String,
    score: Option<f64>,
    sampled_because: String,
    incorrect_fields: Vec<String>,
}

impl CommandOutput for VerdictListOutput {
    fn to_human(&self) -> String {
        if self.verdicts.is_empty() {
            return format!("No verdicts for iteration {}.", self.iteration);
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["VERDICT ID", "OVERALL", "SCORE", "SAMPLED", "INCORRECT FIELDS"]);
        for v in &self.verdicts {
            table.add_row([
                v.id[..8].to_string(),
                v.overall.clone(),
                v.score.map(|s| format!("{s:.2}")).unwrap_or_default(),
                v.sampled_because.clone(),
                v.incorrect_fields.join(", "),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct VersionListOutput {
    versions: Vec<VersionEntry>,
}

#[derive(Debug, serde::Serialize)]
struct VersionEntry {
    version: u32,
    snapshot_hash: String,
    active: bool,
    fields: usize,
    created_at: String,
}

impl CommandOutput for VersionListOutput {
    fn to_human(&self) -> String {
        if self.versions.is_empty() {
            return "No workflow versions.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["VERSION", "SNAPSHOT", "ACTIVE", "FIELDS", "CREATED"]);
        for v in &self.versions {
            table.add_row([
                v.version.to_string(),
                v.snapshot_hash[..12].to_string(),
                if v.active { "*" } else { "" }.to_string(),
                v.fields.to_string(),
                v.created_at.clone(),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct CornerListOutput {
    cases: Vec<CornerEntry>,
    total: usize,
}

#[derive(Debug, serde::Serialize)]
struct CornerEntry {
    id: String,
    field: String,
    pattern: String,
    resolution_kind: String,
}

impl CommandOutput for CornerListOutput {
    fn to_human(&self) -> String {
        if self.cases.is_empty() {
            return "No corner cases recorded.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["ID", "FIELD", "PATTERN", "RESOLUTION"]);
        for c in &self.cases {
            table.add_row([
                c.id[..8].to_string(),
                c.field.clone(),
                truncate(&c.pattern, 44),
                c.resolution_kind.clone(),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn describe_strategy(strategy: &FieldStrategy) -> String {
    match strategy {
        FieldStrategy::ModelTier { tier } => format!("model (tier {tier})"),
        FieldStrategy::DeterministicRule { fallback_tier, .. } => {
            format!("rule (fallback tier {fallback_tier})")
        }
        FieldStrategy::CornerCaseLookup { fallback_tier } => {
            format!("corner-case lookup (fallback tier {fallback_tier})")
        }
    }
}

pub async fn execute(args: ObserveArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let tasks = SqliteTaskRepository::new(pool.clone());

    match args.command {
        ObserveCommands::Status { task } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let workflows = SqliteWorkflowRepository::new(pool);
            let schema = workflows.active_schema(task.id).await?;
            let workflow = workflows.active_workflow(task.id).await?;

            let fields = workflow
                .as_ref()
                .map(|w| {
                    w.strategies
                        .iter()
                        .map(|(field, strategy)| FieldAssignment {
                            field: field.clone(),
                            strategy: describe_strategy(strategy),
                            model: w.model_for(field).map(String::from),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let out = StatusOutput {
                name: task.name,
                status: task.status.as_str().to_string(),
                iteration: task.iteration,
                max_iteration: task.max_iteration,
                schema_version: schema.map(|s| s.version),
                workflow_version: workflow.as_ref().map(|w| w.version),
                snapshot_hash: workflow.map(|w| w.snapshot_hash),
                fields,
            };
            output(&out, json_mode);
        }

        ObserveCommands::Events { task, limit } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let events = SqliteEventRepository::new(pool);
            let mut events = events.list_for_task(task.id).await?;
            if let Some(limit) = limit {
                let skip = events.len().saturating_sub(limit);
                events.drain(..skip);
            }
            let out = EventListOutput {
                total: events.len(),
                events: events
                    .into_iter()
                    .map(|e| EventEntry {
                        kind: e.kind.as_str().to_string(),
                        iteration: e.iteration,
                        at: e.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        trigger: e.trigger,
                        mutation: e.mutation,
                        outcome: e.outcome,
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }

        ObserveCommands::Verdicts { task, iteration } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let iteration = iteration.unwrap_or(task.iteration);
            let reviews = SqliteReviewRepository::new(pool);
            let verdicts = reviews.verdicts_for_iteration(task.id, iteration).await?;
            let out = VerdictListOutput {
                iteration,
                total: verdicts.len(),
                verdicts: verdicts
                    .into_iter()
                    .map(|v| VerdictEntry {
                        id: v.id.to_string(),
                        extraction_id: v.extraction_id.to_string(),
                        overall: v.overall.as_str().to_string(),
                        score: v.overall_score,
                        sampled_because: v.sampling_reason.as_str().to_string(),
                        incorrect_fields: v
                            .field_verdicts
                            .iter()
                            .filter(|fv| fv.class.is_failure())
                            .map(|fv| fv.field.clone())
                            .collect(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }

        ObserveCommands::Versions { task } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let workflows = SqliteWorkflowRepository::new(pool);
            let versions = workflows.list_workflows(task.id).await?;
            let out = VersionListOutput {
                versions: versions
                    .into_iter()
                    .map(|w| VersionEntry {
                        version: w.version,
                        snapshot_hash: w.snapshot_hash,
                        active: w.is_active,
                        fields: w.strategies.len(),
                        created_at: w.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }

        ObserveCommands::Corners { task, field } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let corners = SqliteCornerCaseRepository::new(pool);
            let cases = match field {
                Some(field) => corners.list_for_field(task.id, &field).await?,
                None => corners.list_for_task(task.id).await?,
            };
            let out = CornerListOutput {
                total: cases.len(),
                cases: cases
                    .into_iter()
                    .map(|c| CornerEntry {
                        id: c.id.to_string(),
                        field: c.field.clone(),
                        pattern: c.pattern.clone().unwrap_or_default(),
                        resolution_kind: c.resolution_kind.as_str().to_string(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

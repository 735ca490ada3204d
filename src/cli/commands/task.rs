//! `anyextract task` - extraction task management.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::workflow::FieldDef;
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::{TaskFilters, TaskRepository};
use crate::infrastructure::database::SqliteTaskRepository;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task and bootstrap its initial schema and workflow
    Create {
        /// Unique task name
        name: String,
        /// What this task extracts
        #[arg(short, long)]
        description: String,
        /// Schema fields, format: "name:type[:description]"
        #[arg(short, long, required = true)]
        field: Vec<String>,
        /// Iteration bound after which the task locks
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// List tasks
    List {
        /// Filter by status (bootstrapping, running, evolving, locked, failed)
        #[arg(short, long)]
        status: Option<String>,
        /// Include archived tasks
        #[arg(long)]
        archived: bool,
    },
    /// Show task details
    Show {
        /// Task name or ID
        task: String,
    },
    /// Archive a task (tasks are never deleted)
    Archive {
        /// Task name or ID
        task: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub iteration: u32,
    pub max_iteration: u32,
    pub archived: bool,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            iteration: task.iteration,
            max_iteration: task.max_iteration,
            archived: task.archived,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct TaskListOutput {
    tasks: Vec<TaskOutput>,
    total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["ID", "NAME", "STATUS", "ITERATION"]);
        for task in &self.tasks {
            table.add_row([
                task.id[..8].to_string(),
                truncate(&task.name, 24),
                task.status.clone(),
                format!("{}/{}", task.iteration, task.max_iteration),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct TaskActionOutput {
    success: bool,
    message: String,
    task: Option<TaskOutput>,
}

impl CommandOutput for TaskActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct TaskDetailOutput {
    task: TaskOutput,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let t = &self.task;
        [
            format!("Task: {}", t.name),
            format!("ID: {}", t.id),
            format!("Status: {}", t.status),
            format!("Iteration: {}/{}", t.iteration, t.max_iteration),
            format!("Description: {}", t.description),
            format!("Archived: {}", t.archived),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn parse_field(spec: &str) -> Result<FieldDef> {
    let mut parts = spec.splitn(3, ':');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid field spec '{spec}': expected name:type"))?;
    let field_type = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid field spec '{spec}': expected name:type"))?;

    let mut field = FieldDef::new(name, field_type);
    field.description = parts.next().map(String::from);
    Ok(field)
}

pub async fn execute(args: TaskArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let repo = SqliteTaskRepository::new(pool.clone());

    match args.command {
        TaskCommands::Create { name, description, field, max_iterations } => {
            let fields = field.iter().map(|f| parse_field(f)).collect::<Result<Vec<_>>>()?;

            let task = Task::new(name, description)
                .with_max_iteration(max_iterations.unwrap_or(config.engine.max_iterations));
            task.validate().map_err(|e| anyhow::anyhow!(e))?;
            repo.insert(&task).await?;

            // Bootstrapping needs no model access; offline wiring avoids
            // requiring an API key at task creation.
            let engine = super::build_engine(&pool, &config, true)?;
            let task = engine.bootstrap(task.id, fields).await?;

            let out = TaskActionOutput {
                success: true,
                message: format!("Task created and bootstrapped: {}", task.id),
                task: Some(TaskOutput::from(&task)),
            };
            output(&out, json_mode);
        }

        TaskCommands::List { status, archived } => {
            let status = match status {
                Some(s) => Some(
                    TaskStatus::from_str(&s)
                        .ok_or_else(|| anyhow::anyhow!("Unknown status: {s}"))?,
                ),
                None => None,
            };
            let filters = TaskFilters { status, include_archived: archived };
            let tasks = repo.list(filters).await?;
            let out = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(TaskOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TaskCommands::Show { task } => {
            let task = super::resolve_task(&repo, &task).await?;
            let out = TaskDetailOutput { task: TaskOutput::from(&task) };
            output(&out, json_mode);
        }

        TaskCommands::Archive { task } => {
            let task = super::resolve_task(&repo, &task).await?;
            repo.archive(task.id).await?;
            let out = TaskActionOutput {
                success: true,
                message: format!("Task archived: {}", task.name),
                task: None,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_spec() {
        let field = parse_field("trade_date:date:Settlement date of the trade").unwrap();
        assert_eq!(field.name, "trade_date");
        assert_eq!(field.field_type, "date");
        assert_eq!(field.description.as_deref(), Some("Settlement date of the trade"));

        let bare = parse_field("amount:number").unwrap();
        assert_eq!(bare.description, None);

        assert!(parse_field("broken").is_err());
        assert!(parse_field(":date").is_err());
    }
}

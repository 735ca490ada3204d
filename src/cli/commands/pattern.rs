//! `anyextract pattern` - the cross-task shared pattern library.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::SharedPattern;
use crate::domain::ports::CornerCaseRepository;
use crate::infrastructure::database::{
    SqliteCornerCaseRepository, SqlitePatternRepository, SqliteTaskRepository,
};
use crate::services::PatternLibrary;

#[derive(Args, Debug)]
pub struct PatternArgs {
    #[command(subcommand)]
    pub command: PatternCommands,
}

#[derive(Subcommand, Debug)]
pub enum PatternCommands {
    /// Promote a task's corner case into the shared library
    Promote {
        /// Task name or ID owning the corner case
        task: String,
        /// Corner case ID
        case: Uuid,
        /// Library category (e.g. date-formats, currency)
        #[arg(short, long)]
        category: String,
    },
    /// List shared patterns, most trusted first
    List {
        /// Restrict to one category
        #[arg(short, long)]
        category: Option<String>,
        /// Hide patterns below this confidence
        #[arg(long, default_value_t = 0.0)]
        min_confidence: f64,
    },
    /// Record a reuse outcome for a pattern
    Outcome {
        /// Pattern name
        name: String,
        /// The reuse succeeded
        #[arg(long, conflicts_with = "failure")]
        success: bool,
        /// The reuse failed
        #[arg(long)]
        failure: bool,
    },
}

#[derive(Debug, serde::Serialize)]
struct PatternOutput {
    name: String,
    category: String,
    confidence: f64,
    usage_count: u64,
    success_count: u64,
}

impl From<&SharedPattern> for PatternOutput {
    fn from(p: &SharedPattern) -> Self {
        Self {
            name: p.name.clone(),
            category: p.category.clone(),
            confidence: p.confidence,
            usage_count: p.usage_count,
            success_count: p.success_count,
        }
    }
}

impl CommandOutput for PatternOutput {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] confidence {:.2} ({}/{} successful uses)",
            self.name, self.category, self.confidence, self.success_count, self.usage_count
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
struct PatternListOutput {
    patterns: Vec<PatternOutput>,
    total: usize,
}

impl CommandOutput for PatternListOutput {
    fn to_human(&self) -> String {
        if self.patterns.is_empty() {
            return "No shared patterns.".to_string();
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(["NAME", "CATEGORY", "CONFIDENCE", "USES", "SUCCESSES"]);
        for p in &self.patterns {
            table.add_row([
                truncate(&p.name, 32),
                p.category.clone(),
                format!("{:.2}", p.confidence),
                p.usage_count.to_string(),
                p.success_count.to_string(),
            ]);
        }
        format!("{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PatternArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let library = PatternLibrary::new(Arc::new(SqlitePatternRepository::new(pool.clone())));

    match args.command {
        PatternCommands::Promote { task, case, category } => {
            let tasks = SqliteTaskRepository::new(pool.clone());
            let task = super::resolve_task(&tasks, &task).await?;

            let corners = SqliteCornerCaseRepository::new(pool);
            let corner = corners
                .list_for_task(task.id)
                .await?
                .into_iter()
                .find(|c| c.id == case)
                .ok_or_else(|| anyhow::anyhow!("Corner case not found: {case}"))?;

            let pattern = library.promote(&corner, &category).await?;
            output(&PatternOutput::from(&pattern), json_mode);
        }

        PatternCommands::List { category, min_confidence } => {
            let patterns = library.suggest(category.as_deref()).await?;
            let out = PatternListOutput {
                patterns: patterns
                    .iter()
                    .filter(|p| p.confidence >= min_confidence)
                    .map(PatternOutput::from)
                    .collect(),
                total: patterns.len(),
            };
            output(&out, json_mode);
        }

        PatternCommands::Outcome { name, success, failure } => {
            if success == failure {
                anyhow::bail!("Pass exactly one of --success or --failure");
            }
            let pattern = library.record_outcome(&name, success).await?;
            output(&PatternOutput::from(&pattern), json_mode);
        }
    }

    Ok(())
}

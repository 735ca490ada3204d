//! `anyextract run` - execute one extraction cycle over a task's documents.

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::database::SqliteTaskRepository;
use crate::services::evolution::RunReport;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task name or ID
    pub task: String,

    /// Review every extraction regardless of the adaptive rate
    #[arg(long)]
    pub full: bool,

    /// Seed for deterministic review sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use the deterministic offline model instead of the configured API
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, serde::Serialize)]
struct RunOutput {
    iteration: u32,
    extracted: usize,
    reviewed: usize,
    sampling_rate: f64,
}

impl From<&RunReport> for RunOutput {
    fn from(report: &RunReport) -> Self {
        Self {
            iteration: report.iteration,
            extracted: report.extracted,
            reviewed: report.reviewed,
            sampling_rate: report.manifest.rate,
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "Iteration {}: extracted {} document(s), reviewed {} (rate {:.0}%)",
            self.iteration,
            self.extracted,
            self.reviewed,
            self.sampling_rate * 100.0
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = super::resolve_task(&tasks, &args.task).await?;

    let engine = super::build_engine(&pool, &config, args.offline)?;

    let spinner = if json_mode {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Running extraction for '{}'", task.name));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let result = engine.run(task.id, args.full, args.seed).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result?;
    output(&RunOutput::from(&report), json_mode);
    Ok(())
}

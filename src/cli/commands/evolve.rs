//! `anyextract evolve` - evolution cycles and lock overrides.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::database::SqliteTaskRepository;
use crate::services::diagnosis::TriggerReason;
use crate::services::evolution::EvolutionOutcome;

#[derive(Args, Debug)]
pub struct EvolveArgs {
    #[command(subcommand)]
    pub command: EvolveCommands,
}

#[derive(Subcommand, Debug)]
pub enum EvolveCommands {
    /// Attempt one evolution cycle (the trigger gate decides whether it runs)
    Trigger {
        /// Task name or ID
        task: String,
        /// Use the deterministic offline model instead of the configured API
        #[arg(long)]
        offline: bool,
    },
    /// Extend a locked task's iteration bound and resume it
    Override {
        /// Task name or ID
        task: String,
        /// Additional iterations to grant
        #[arg(short, long, default_value_t = 1)]
        iterations: u32,
    },
}

#[derive(Debug, serde::Serialize)]
struct EvolveOutput {
    outcome: String,
    detail: String,
}

impl CommandOutput for EvolveOutput {
    fn to_human(&self) -> String {
        format!("{}: {}", self.outcome, self.detail)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn describe_reason(reason: TriggerReason) -> &'static str {
    match reason {
        TriggerReason::MaxIterationsReached => "the iteration bound has been reached",
        TriggerReason::AlreadyEvolving => "an evolution cycle is already in progress",
        TriggerReason::InsufficientJudgments => "not enough judged extractions this iteration",
        TriggerReason::QualityOk => "quality is above the trigger thresholds",
        TriggerReason::QualityDrop => "quality dropped below the trigger thresholds",
    }
}

fn describe_outcome(outcome: &EvolutionOutcome) -> EvolveOutput {
    match outcome {
        EvolutionOutcome::NotTriggered { reason } => EvolveOutput {
            outcome: "not-triggered".to_string(),
            detail: describe_reason(*reason).to_string(),
        },
        EvolutionOutcome::LockedRefusal { directives_recorded } => EvolveOutput {
            outcome: "refused".to_string(),
            detail: format!(
                "task is locked; {directives_recorded} directive(s) recorded for audit. \
                 Use 'evolve override' to grant more iterations."
            ),
        },
        EvolutionOutcome::NoChange => EvolveOutput {
            outcome: "no-change".to_string(),
            detail: "diagnosis produced no workflow mutation".to_string(),
        },
        EvolutionOutcome::Applied { workflow_version } => EvolveOutput {
            outcome: "applied".to_string(),
            detail: format!("workflow version {workflow_version} is now active"),
        },
        EvolutionOutcome::RolledBack { restored_version } => EvolveOutput {
            outcome: "rolled-back".to_string(),
            detail: format!(
                "successor failed re-verification; version {restored_version} restored"
            ),
        },
    }
}

pub async fn execute(args: EvolveArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let tasks = SqliteTaskRepository::new(pool.clone());

    match args.command {
        EvolveCommands::Trigger { task, offline } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let engine = super::build_engine(&pool, &config, offline)?;
            let outcome = engine.evolve(task.id).await?;
            output(&describe_outcome(&outcome), json_mode);
        }

        EvolveCommands::Override { task, iterations } => {
            let task = super::resolve_task(&tasks, &task).await?;
            let engine = super::build_engine(&pool, &config, true)?;
            let task = engine.override_lock(task.id, iterations).await?;
            let out = EvolveOutput {
                outcome: "unlocked".to_string(),
                detail: format!(
                    "'{}' may now evolve through iteration {}",
                    task.name, task.max_iteration
                ),
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
    fn test_outcome_descriptions() {
        let applied = describe_outcome(&EvolutionOutcome::Applied { workflow_version: 3 });
        assert_eq!(applied.outcome, "applied");
        assert!(applied.detail.contains('3'));

        let refused = describe_outcome(&EvolutionOutcome::LockedRefusal { directives_recorded: 2 });
        assert_eq!(refused.outcome, "refused");

        let gated = describe_outcome(&EvolutionOutcome::NotTriggered {
            reason: TriggerReason::QualityOk,
        });
        assert_eq!(gated.outcome, "not-triggered");
    }
}

//! `anyextract feedback` - human feedback against review verdicts.
//!
//! Feedback never mutates stored extractions; it accumulates as evidence
//! for the next evolution cycle.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{FeedbackKind, FeedbackRecord};
use crate::domain::ports::ReviewRepository;
use crate::infrastructure::database::SqliteReviewRepository;

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    #[command(subcommand)]
    pub command: FeedbackCommands,
}

#[derive(Subcommand, Debug)]
pub enum FeedbackCommands {
    /// Record the correct value for a field the extraction got wrong
    Correct {
        /// Review verdict ID
        verdict: Uuid,
        /// Field name
        field: String,
        /// Value the extraction produced
        #[arg(long)]
        original: String,
        /// Value it should have produced
        #[arg(long)]
        corrected: String,
    },
    /// Reject a field's extracted value without supplying a replacement
    Reject {
        /// Review verdict ID
        verdict: Uuid,
        /// Field name
        field: String,
        /// Why the value is wrong
        #[arg(short, long)]
        comment: String,
    },
    /// Confirm a verdict as correct
    Approve {
        /// Review verdict ID
        verdict: Uuid,
        /// Optional note
        #[arg(short, long)]
        comment: Option<String>,
    },
}

#[derive(Debug, serde::Serialize)]
struct FeedbackOutput {
    id: String,
    verdict_id: String,
    kind: String,
}

impl CommandOutput for FeedbackOutput {
    fn to_human(&self) -> String {
        format!("Recorded {} feedback ({})", self.kind, self.id)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: FeedbackArgs, json_mode: bool) -> Result<()> {
    let config = super::load_config()?;
    let pool = super::open_database(&config).await?;
    let reviews = SqliteReviewRepository::new(pool);

    let record = match args.command {
        FeedbackCommands::Correct { verdict, field, original, corrected } => {
            FeedbackRecord::correction(verdict, field, original, corrected)
        }
        FeedbackCommands::Reject { verdict, field, comment } => {
            FeedbackRecord::rejection(verdict, field, comment)
        }
        FeedbackCommands::Approve { verdict, comment } => {
            let mut record = FeedbackRecord::new(verdict, FeedbackKind::Approval);
            record.comment = comment;
            record
        }
    };

    reviews.insert_feedback(&record).await?;

    let out = FeedbackOutput {
        id: record.id.to_string(),
        verdict_id: record.verdict_id.to_string(),
        kind: record.kind.as_str().to_string(),
    };
    output(&out, json_mode);
    Ok(())
}

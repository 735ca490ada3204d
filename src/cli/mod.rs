//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anyextract")]
#[command(about = "Self-evolving document extraction engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configuration and database
    Init(commands::init::InitArgs),
    /// Extraction task management
    Task(commands::task::TaskArgs),
    /// Document registration
    Doc(commands::doc::DocArgs),
    /// Run extraction with adaptive review sampling
    Run(commands::run::RunArgs),
    /// Trigger or override evolution cycles
    Evolve(commands::evolve::EvolveArgs),
    /// Record human feedback on review verdicts
    Feedback(commands::feedback::FeedbackArgs),
    /// Inspect task state, versions, and the audit trail
    Observe(commands::observe::ObserveArgs),
    /// Cross-task shared pattern library
    Pattern(commands::pattern::PatternArgs),
}

pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let payload = serde_json::json!({ "success": false, "error": err.to_string() });
        eprintln!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    } else {
        eprintln!("{}", console::style(format!("Error: {err:#}")).red());
    }
    std::process::exit(1);
}

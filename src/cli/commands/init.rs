//! `anyextract init` - project initialization.

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::config::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, serde::Serialize)]
struct InitOutput {
    config_path: String,
    database_path: String,
    migrations_applied: usize,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        format!(
            "Initialized.\n  Config:   {}\n  Database: {} ({} migration(s) applied)",
            self.config_path, self.database_path, self.migrations_applied
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let config_dir = Path::new(".anyextract");
    let config_path = config_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::create_dir_all(config_dir).context("Failed to create .anyextract directory")?;

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    std::fs::write(&config_path, yaml).context("Failed to write config file")?;

    // Reload through the normal path so env overrides apply before the
    // database lands somewhere unexpected.
    let config = ConfigLoader::load()?;
    let pool = crate::cli::commands::open_database(&config).await?;
    let migrator = crate::infrastructure::database::Migrator::new(pool);
    let version = migrator.get_current_version().await?;

    let out = InitOutput {
        config_path: config_path.display().to_string(),
        database_path: config.database.path.clone(),
        migrations_applied: version as usize,
    };
    output(&out, json_mode);
    Ok(())
}

//! CLI command implementations.

pub mod doc;
pub mod evolve;
pub mod feedback;
pub mod init;
pub mod observe;
pub mod pattern;
pub mod run;
pub mod task;

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::models::config::Config;
use crate::domain::models::Task;
use crate::domain::ports::{ModelClient, ReviewJudge, TaskRepository};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{
    all_embedded_migrations, create_pool, Migrator, PoolConfig, SqliteCornerCaseRepository,
    SqliteDocumentRepository, SqliteEventRepository, SqliteExtractionRepository,
    SqliteReviewRepository, SqliteTaskRepository, SqliteWorkflowRepository,
};
use crate::infrastructure::llm::{ApprovingJudge, LlmJudge, OfflineModelClient, OpenAiCompatClient};
use crate::services::evolution::{EngineDeps, EvolutionEngine};
use crate::services::rewriter::StrategyRewriter;
use crate::services::strategy::{StrategyExecutor, StrategyRegistry};

pub(crate) fn load_config() -> Result<Config> {
    ConfigLoader::load()
}

pub(crate) async fn open_database(config: &Config) -> Result<SqlitePool> {
    let url = format!("sqlite://{}", config.database.path);
    let pool = create_pool(
        &url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        }),
    )
    .await
    .context("Failed to open database. Run 'anyextract init' first.")?;

    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to apply database migrations")?;

    Ok(pool)
}

/// Wire repositories, model client, and judge into an engine. `offline`
/// substitutes the deterministic stand-ins for both model ports.
pub(crate) fn build_engine(
    pool: &SqlitePool,
    config: &Config,
    offline: bool,
) -> Result<EvolutionEngine> {
    let deps = EngineDeps {
        tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
        documents: Arc::new(SqliteDocumentRepository::new(pool.clone())),
        extractions: Arc::new(SqliteExtractionRepository::new(pool.clone())),
        reviews: Arc::new(SqliteReviewRepository::new(pool.clone())),
        workflows: Arc::new(SqliteWorkflowRepository::new(pool.clone())),
        corner_cases: Arc::new(SqliteCornerCaseRepository::new(pool.clone())),
        events: Arc::new(SqliteEventRepository::new(pool.clone())),
        judge: build_judge(config, offline)?,
        rewriter: Arc::new(StrategyRewriter::new()),
    };

    let client: Arc<dyn ModelClient> = if offline {
        Arc::new(OfflineModelClient)
    } else {
        Arc::new(OpenAiCompatClient::new(&config.model)?)
    };
    let executor = StrategyExecutor::new(StrategyRegistry::with_builtins(client));

    Ok(EvolutionEngine::new(
        deps,
        executor,
        config.engine.clone(),
        config.model.tiers.clone(),
    ))
}

fn build_judge(config: &Config, offline: bool) -> Result<Arc<dyn ReviewJudge>> {
    if offline {
        return Ok(Arc::new(ApprovingJudge));
    }
    let client = OpenAiCompatClient::new(&config.model)?;
    Ok(Arc::new(LlmJudge::new(client, config.model.judge_model.clone())))
}

/// Resolve a task reference that is either a UUID or a unique task name.
pub(crate) async fn resolve_task(repo: &SqliteTaskRepository, reference: &str) -> Result<Task> {
    if let Ok(id) = Uuid::parse_str(reference) {
        if let Some(task) = repo.get(id).await? {
            return Ok(task);
        }
    }
    repo.get_by_name(reference)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found: {reference}"))
}

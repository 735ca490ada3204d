mod helpers;

use std::collections::BTreeMap;

use anyextract::domain::models::{
    ConfidenceWeights, FieldDef, FieldStrategy, SchemaVersion, Task, WorkflowVersion,
};
use anyextract::domain::ports::{TaskRepository, WorkflowRepository};
use anyextract::infrastructure::database::{SqliteTaskRepository, SqliteWorkflowRepository};
use uuid::Uuid;

use helpers::database::{setup_test_db, teardown_test_db};

async fn seed_task(pool: &sqlx::SqlitePool) -> Task {
    let repo = SqliteTaskRepository::new(pool.clone());
    let task = Task::new(format!("task-{}", Uuid::new_v4()), "workflow repo test");
    repo.insert(&task).await.expect("failed to insert task");
    task
}

fn sample_workflow(task_id: Uuid, version: u32) -> WorkflowVersion {
    let mut strategies = BTreeMap::new();
    strategies.insert("total".to_string(), FieldStrategy::ModelTier { tier: 0 });
    strategies.insert(
        "date".to_string(),
        FieldStrategy::DeterministicRule {
            pattern: r"\d{4}-\d{2}-\d{2}".to_string(),
            fallback_tier: 0,
        },
    );
    WorkflowVersion::new(
        task_id,
        version,
        strategies,
        vec!["frontier-model".to_string(), "small-model".to_string()],
        ConfidenceWeights::default(),
    )
}

#[tokio::test]
async fn test_schema_insert_and_activate() {
    let pool = setup_test_db().await;
    let task = seed_task(&pool).await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let v1 = SchemaVersion::new(task.id, 1, vec![FieldDef::new("total", "number")]);
    let v2 = SchemaVersion::new(
        task.id,
        2,
        vec![FieldDef::new("total", "number"), FieldDef::new("date", "date")],
    );
    repo.insert_schema(&v1).await.expect("failed to insert v1");
    repo.insert_schema(&v2).await.expect("failed to insert v2");

    repo.activate_schema(task.id, v1.id).await.expect("failed to activate v1");
    repo.activate_schema(task.id, v2.id).await.expect("failed to activate v2");

    // Exactly one schema version is active at a time.
    let active = repo
        .active_schema(task.id)
        .await
        .expect("failed to query")
        .expect("no active schema");
    assert_eq!(active.id, v2.id);
    assert_eq!(active.fields.len(), 2);

    let v1_again = repo.get_schema(v1.id).await.unwrap().unwrap();
    assert!(!v1_again.is_active);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_workflow_activation_swings_pointer() {
    let pool = setup_test_db().await;
    let task = seed_task(&pool).await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let v1 = sample_workflow(task.id, 1);
    let v2 = v1.successor(v1.strategies.clone());
    repo.insert_workflow(&v1).await.expect("failed to insert v1");
    repo.insert_workflow(&v2).await.expect("failed to insert v2");

    repo.activate_workflow(task.id, v1.id).await.expect("failed to activate v1");
    let active = repo.active_workflow(task.id).await.unwrap().unwrap();
    assert_eq!(active.version, 1);

    repo.activate_workflow(task.id, v2.id).await.expect("failed to activate v2");
    let active = repo.active_workflow(task.id).await.unwrap().unwrap();
    assert_eq!(active.version, 2);

    // Rollback is just another pointer swing to a retained version.
    repo.activate_workflow(task.id, v1.id).await.expect("failed to roll back");
    let active = repo.active_workflow(task.id).await.unwrap().unwrap();
    assert_eq!(active.version, 1);

    let all = repo.list_workflows(task.id).await.expect("failed to list");
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|w| w.is_active).count(), 1);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_workflow_round_trips_strategies() {
    let pool = setup_test_db().await;
    let task = seed_task(&pool).await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let workflow = sample_workflow(task.id, 1);
    repo.insert_workflow(&workflow).await.expect("failed to insert");

    let retrieved = repo.get_workflow(workflow.id).await.unwrap().unwrap();
    assert_eq!(retrieved.strategies, workflow.strategies);
    assert_eq!(retrieved.tier_ladder, workflow.tier_ladder);
    assert_eq!(retrieved.snapshot_hash, workflow.snapshot_hash);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_activate_unknown_workflow_fails() {
    let pool = setup_test_db().await;
    let task = seed_task(&pool).await;
    let repo = SqliteWorkflowRepository::new(pool.clone());

    let err = repo
        .activate_workflow(task.id, Uuid::new_v4())
        .await
        .expect_err("activation of unknown version must fail");
    let message = err.to_string();
    assert!(!message.is_empty());

    teardown_test_db(pool).await;
}

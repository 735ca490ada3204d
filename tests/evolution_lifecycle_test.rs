mod helpers;

use std::sync::Arc;

use anyextract::domain::models::{
    Document, EngineConfig, EventKind, FieldDef, ParsedPage, Task, TaskStatus,
};
use anyextract::domain::ports::{
    DocumentRepository, EventRepository, ExtractionRepository, ReviewRepository, TaskRepository,
    WorkflowRepository,
};
use anyextract::infrastructure::database::{
    SqliteCornerCaseRepository, SqliteDocumentRepository, SqliteEventRepository,
    SqliteExtractionRepository, SqliteReviewRepository, SqliteTaskRepository,
    SqliteWorkflowRepository,
};
use anyextract::infrastructure::llm::{ApprovingJudge, OfflineModelClient};
use anyextract::services::evolution::{EngineDeps, EvolutionEngine, EvolutionOutcome};
use anyextract::services::rewriter::StrategyRewriter;
use anyextract::services::strategy::{StrategyExecutor, StrategyRegistry};
use anyextract::services::diagnosis::TriggerReason;

use helpers::database::{setup_test_db, teardown_test_db};

fn build_engine(pool: &sqlx::SqlitePool) -> EvolutionEngine {
    let deps = EngineDeps {
        tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
        documents: Arc::new(SqliteDocumentRepository::new(pool.clone())),
        extractions: Arc::new(SqliteExtractionRepository::new(pool.clone())),
        reviews: Arc::new(SqliteReviewRepository::new(pool.clone())),
        workflows: Arc::new(SqliteWorkflowRepository::new(pool.clone())),
        corner_cases: Arc::new(SqliteCornerCaseRepository::new(pool.clone())),
        events: Arc::new(SqliteEventRepository::new(pool.clone())),
        judge: Arc::new(ApprovingJudge),
        rewriter: Arc::new(StrategyRewriter::new()),
    };
    let executor = StrategyExecutor::new(StrategyRegistry::with_builtins(Arc::new(
        OfflineModelClient,
    )));
    EvolutionEngine::new(
        deps,
        executor,
        EngineConfig::default(),
        vec!["frontier-model".to_string(), "small-model".to_string()],
    )
}

fn invoice_fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("invoice_date", "date"),
        FieldDef::new("total", "number"),
    ]
}

async fn seed_documents(pool: &sqlx::SqlitePool, task_id: uuid::Uuid, count: usize) {
    let docs = SqliteDocumentRepository::new(pool.clone());
    for n in 0..count {
        let text = format!("Invoice 2026-03-1{n}\ntotal: {n}42.50");
        let document = Document::new(task_id, format!("invoice-{n}.txt"), format!("hash-{n}"))
            .with_pages(vec![ParsedPage {
                page_number: 1,
                text,
                clarity: Some(0.9),
            }]);
        docs.insert(&document).await.expect("failed to insert document");
    }
}

#[tokio::test]
async fn test_bootstrap_creates_initial_versions() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("invoices", "Extract invoice fields");
    tasks.insert(&task).await.unwrap();

    let task = engine
        .bootstrap(task.id, invoice_fields())
        .await
        .expect("bootstrap failed");
    assert_eq!(task.status, TaskStatus::Running);

    let workflows = SqliteWorkflowRepository::new(pool.clone());
    let schema = workflows.active_schema(task.id).await.unwrap().unwrap();
    assert_eq!(schema.version, 1);
    assert_eq!(schema.fields.len(), 2);

    let workflow = workflows.active_workflow(task.id).await.unwrap().unwrap();
    assert_eq!(workflow.version, 1);
    assert_eq!(workflow.strategies.len(), 2);

    let events = SqliteEventRepository::new(pool.clone());
    let trail = events.list_for_task(task.id).await.unwrap();
    assert!(trail.iter().any(|e| e.kind == EventKind::Bootstrap));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_first_run_reviews_everything() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("invoices", "Extract invoice fields");
    tasks.insert(&task).await.unwrap();
    let task = engine.bootstrap(task.id, invoice_fields()).await.unwrap();

    seed_documents(&pool, task.id, 3).await;

    let report = engine.run(task.id, false, Some(7)).await.expect("run failed");
    assert_eq!(report.iteration, 0);
    assert_eq!(report.extracted, 3);
    // Iteration 0 always reviews the whole set.
    assert_eq!(report.reviewed, 3);
    assert!((report.manifest.rate - 1.0).abs() < f64::EPSILON);

    let reviews = SqliteReviewRepository::new(pool.clone());
    let verdicts = reviews.verdicts_for_iteration(task.id, 0).await.unwrap();
    assert_eq!(verdicts.len(), 3);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_run_extracts_each_document_exactly_once() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("invoices", "Extract invoice fields");
    tasks.insert(&task).await.unwrap();
    let task = engine.bootstrap(task.id, invoice_fields()).await.unwrap();
    seed_documents(&pool, task.id, 5).await;

    let report = engine.run(task.id, false, Some(7)).await.expect("run failed");
    assert_eq!(report.extracted, 5);

    // Concurrent per-document fan-out must still persist one record per
    // document, no duplicates and no drops.
    let extractions = SqliteExtractionRepository::new(pool.clone());
    let records = extractions.list_for_iteration(task.id, 0).await.unwrap();
    assert_eq!(records.len(), 5);
    let distinct: std::collections::HashSet<uuid::Uuid> =
        records.iter().map(|r| r.document_id).collect();
    assert_eq!(distinct.len(), 5);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_run_rejects_bootstrapping_task() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("not-ready", "Never bootstrapped");
    tasks.insert(&task).await.unwrap();

    let err = engine.run(task.id, false, None).await.expect_err("run must fail");
    assert!(matches!(
        err,
        anyextract::domain::errors::DomainError::InvalidStateTransition { .. }
    ));

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_healthy_window_does_not_trigger_evolution() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("invoices", "Extract invoice fields");
    tasks.insert(&task).await.unwrap();
    let task = engine.bootstrap(task.id, invoice_fields()).await.unwrap();
    seed_documents(&pool, task.id, 4).await;
    engine.run(task.id, false, Some(7)).await.unwrap();

    // Every verdict approved: the gate sees healthy quality and holds.
    let outcome = engine.evolve(task.id).await.expect("evolve failed");
    assert_eq!(
        outcome,
        EvolutionOutcome::NotTriggered { reason: TriggerReason::QualityOk }
    );

    let task = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.iteration, 0);

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_sparse_window_is_insufficient() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("sparse", "One document only");
    tasks.insert(&task).await.unwrap();
    let task = engine.bootstrap(task.id, invoice_fields()).await.unwrap();
    seed_documents(&pool, task.id, 1).await;
    engine.run(task.id, false, Some(7)).await.unwrap();

    let outcome = engine.evolve(task.id).await.expect("evolve failed");
    assert_eq!(
        outcome,
        EvolutionOutcome::NotTriggered { reason: TriggerReason::InsufficientJudgments }
    );

    teardown_test_db(pool).await;
}

#[tokio::test]
async fn test_exhausted_task_refuses_and_unlocks_on_override() {
    let pool = setup_test_db().await;
    let engine = build_engine(&pool);

    let tasks = SqliteTaskRepository::new(pool.clone());
    let task = Task::new("capped", "Zero iteration budget").with_max_iteration(0);
    tasks.insert(&task).await.unwrap();
    let task = engine.bootstrap(task.id, invoice_fields()).await.unwrap();
    seed_documents(&pool, task.id, 3).await;
    engine.run(task.id, false, Some(7)).await.unwrap();

    let outcome = engine.evolve(task.id).await.expect("evolve failed");
    assert!(matches!(outcome, EvolutionOutcome::LockedRefusal { .. }));

    let locked = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(locked.status, TaskStatus::Locked);

    // A locked task still extracts; refusal only freezes the workflow.
    let report = engine.run(task.id, false, Some(8)).await.expect("locked run failed");
    assert_eq!(report.extracted, 3);

    let reopened = engine.override_lock(task.id, 2).await.expect("override failed");
    assert_eq!(reopened.status, TaskStatus::Running);
    assert_eq!(reopened.max_iteration, 2);

    let events = SqliteEventRepository::new(pool.clone());
    let trail = events.list_for_task(task.id).await.unwrap();
    assert!(trail.iter().any(|e| e.kind == EventKind::TaskLocked));
    assert!(trail.iter().any(|e| e.kind == EventKind::LockOverridden));

    teardown_test_db(pool).await;
}
